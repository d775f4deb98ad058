//! Result cards for structured bot replies.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use travelbot_core::{Accommodation, CurrencyConversion, Place, Restaurant};

use crate::markdown::sanitize;

const ACCOMMODATION_COLOR: Color = Color::Blue;
const RESTAURANT_COLOR: Color = Color::LightRed;
const PLACE_COLOR: Color = Color::Green;
const CURRENCY_COLOR: Color = Color::Magenta;

/// Collects card rows behind a colored left rule.
struct Card {
    rule: Style,
    lines: Vec<Line<'static>>,
}

impl Card {
    fn new(color: Color) -> Self {
        Self {
            rule: Style::default().fg(color),
            lines: Vec::new(),
        }
    }

    fn row(&mut self, spans: Vec<Span<'static>>) {
        let mut row = vec![Span::styled("│ ", self.rule)];
        row.extend(spans);
        self.lines.push(Line::from(row));
    }
}

fn title(text: &str) -> Span<'static> {
    Span::styled(sanitize(text), Style::default().add_modifier(Modifier::BOLD))
}

fn muted(text: impl Into<String>) -> Span<'static> {
    Span::styled(text.into(), Style::default().fg(Color::DarkGray))
}

/// Nothing when the backend sent no rating.
fn rating_badge(rating: Option<f64>, color: Color) -> Option<Span<'static>> {
    rating.map(|r| Span::styled(format!(" ⭐ {}점", r), Style::default().fg(color)))
}

fn address_row(card: &mut Card, address: &str) {
    card.row(vec![muted("📍 "), Span::raw(sanitize(address))]);
}

/// `2024-05-01` → `2024. 5. 1.`; anything unparseable is shown as sent.
fn format_date(raw: &str) -> String {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Local).date_naive())
    });
    match date {
        Some(date) => date.format("%Y. %-m. %-d.").to_string(),
        None => sanitize(raw),
    }
}

/// Quote times come either zoned (RFC 3339) or as a bare local date-time.
fn format_timestamp(raw: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt
            .with_timezone(&Local)
            .format("%Y. %-m. %-d. %H:%M:%S")
            .to_string();
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"));
    match naive {
        Ok(dt) => dt.format("%Y. %-m. %-d. %H:%M:%S").to_string(),
        Err(_) => sanitize(raw),
    }
}

pub fn accommodation(data: &Accommodation) -> Vec<Line<'static>> {
    let mut card = Card::new(ACCOMMODATION_COLOR);

    let mut heading = vec![
        title(&data.name),
        Span::raw(" "),
        Span::styled(
            "★".repeat(data.stars.min(5) as usize),
            Style::default().fg(Color::Yellow),
        ),
    ];
    heading.extend(rating_badge(data.rating, ACCOMMODATION_COLOR));
    card.row(heading);
    address_row(&mut card, &data.address);

    let mut stay = Vec::new();
    if let (Some(check_in), Some(check_out)) = (&data.check_in, &data.check_out) {
        stay.push(muted("📅 "));
        stay.push(Span::raw(format!(
            "{} - {}",
            format_date(check_in),
            format_date(check_out)
        )));
    }
    if let Some(guests) = data.guests.filter(|g| *g > 0) {
        if !stay.is_empty() {
            stay.push(Span::raw("  "));
        }
        stay.push(muted("👥 "));
        stay.push(Span::raw(format!("{}명", guests)));
    }
    if !stay.is_empty() {
        card.row(stay);
    }

    card.row(vec![
        Span::styled(
            format!("{} {}", sanitize(&data.currency), data.price),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        muted(" / 1박"),
    ]);
    card.lines
}

pub fn restaurant(data: &Restaurant) -> Vec<Line<'static>> {
    let mut card = Card::new(RESTAURANT_COLOR);

    let mut heading = vec![title(&data.name)];
    heading.extend(rating_badge(data.rating, RESTAURANT_COLOR));
    card.row(heading);
    card.row(vec![
        Span::styled(
            format!("[{}]", sanitize(&data.cuisine)),
            Style::default().fg(RESTAURANT_COLOR),
        ),
        muted(format!(" 가격대 {}", sanitize(&data.price_range))),
    ]);
    address_row(&mut card, &data.address);

    if let Some(rating) = data.rating {
        let filled = rating.floor().clamp(0.0, 5.0) as usize;
        card.row(vec![
            Span::styled("★".repeat(filled), Style::default().fg(Color::Yellow)),
            muted("☆".repeat(5 - filled)),
        ]);
    }
    card.lines
}

pub fn place(data: &Place) -> Vec<Line<'static>> {
    let mut card = Card::new(PLACE_COLOR);

    let mut heading = vec![title(&data.name)];
    heading.extend(rating_badge(data.rating, PLACE_COLOR));
    card.row(heading);
    if !data.category.is_empty() {
        let tags = data
            .category
            .iter()
            .map(|c| format!("#{}", sanitize(c)))
            .collect::<Vec<_>>()
            .join(" ");
        card.row(vec![Span::styled(tags, Style::default().fg(PLACE_COLOR))]);
    }
    address_row(&mut card, &data.address);

    if let Some(fee) = data.fee {
        let currency = data.currency.as_deref().map(sanitize).unwrap_or_default();
        card.row(vec![
            Span::raw(format!("{} {}", currency, fee).trim_start().to_string()),
            muted(" 입장료"),
        ]);
    }
    card.lines
}

pub fn currency(data: &CurrencyConversion) -> Vec<Line<'static>> {
    let mut card = Card::new(CURRENCY_COLOR);
    let from = sanitize(&data.from);
    let to = sanitize(&data.to);

    card.row(vec![title("💱 환율 변환")]);
    card.row(vec![
        Span::styled(
            format!("{} {:.2}", from, data.amount),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled("  →  ", Style::default().fg(CURRENCY_COLOR)),
        Span::styled(
            format!("{} {:.2}", to, data.converted),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ]);
    card.row(vec![
        muted("환율      "),
        Span::raw(format!("1 {} = {:.4} {}", from, data.rate, to)),
    ]);
    card.row(vec![
        muted("기준 시각 "),
        Span::raw(format_timestamp(&data.timestamp)),
    ]);
    card.lines
}

/// Render each record as a card, separated by blank lines.
pub fn list<T>(records: &[T], card: fn(&T) -> Vec<Line<'static>>) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            lines.push(Line::default());
        }
        lines.extend(card(record));
    }
    lines
}
