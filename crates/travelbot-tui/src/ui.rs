use chrono::Local;
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{block::Title, Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use travelbot_core::{Message, Role};

use crate::app::{App, InputMode, QUICK_ACTIONS};
use crate::render;

const USER_COLOR: Color = Color::Cyan;
const BOT_COLOR: Color = Color::Yellow;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let online = app.controller.is_online();
    let has_error = app.controller.error().is_some();
    let quick_actions = app.show_quick_actions();

    let [header_area, offline_area, banner_area, chat_area, quick_area, input_area, footer_area] =
        Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(if online { 0 } else { 1 }),
            Constraint::Length(if has_error { 1 } else { 0 }),
            Constraint::Min(0),
            Constraint::Length(if quick_actions { 3 } else { 0 }),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .areas(area);

    render_header(app, frame, header_area);
    if !online {
        render_offline_strip(frame, offline_area);
    }
    if has_error {
        render_banner(app, frame, banner_area);
    }
    render_chat(app, frame, chat_area);
    if quick_actions {
        render_quick_actions(app, frame, quick_area);
    }
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.show_clear_confirm {
        render_clear_confirm(frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans = vec![
        Span::styled(" ✈ TravelBot ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ];

    if app.controller.session_id().is_some() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(" 세션 진행 중 ", Style::default().bg(Color::Blue).fg(Color::White)));
    }

    spans.push(Span::raw("  "));
    if app.controller.is_online() {
        spans.push(Span::styled("● 온라인", Style::default().fg(Color::LightGreen)));
    } else {
        spans.push(Span::styled("● 오프라인", Style::default().fg(Color::LightRed)));
    }

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_offline_strip(frame: &mut Frame, area: Rect) {
    let strip = Paragraph::new(" 오프라인 상태입니다. 연결되면 다시 메시지를 보낼 수 있어요.")
        .style(Style::default().bg(Color::Red).fg(Color::White));
    frame.render_widget(strip, area);
}

fn render_banner(app: &App, frame: &mut Frame, area: Rect) {
    let Some(error) = app.controller.error() else {
        return;
    };
    let banner = Paragraph::new(Line::from(vec![
        Span::raw(" ⚠ "),
        Span::raw(error.to_string()),
        Span::styled("  (e 닫기)", Style::default().fg(Color::Gray)),
    ]))
    .style(Style::default().bg(Color::LightRed).fg(Color::Black));
    frame.render_widget(banner, area);
}

fn message_header(message: &Message, selected: bool) -> Line<'static> {
    let (label, color) = match message.role {
        Role::User => ("나", USER_COLOR),
        Role::Bot => ("트래블봇", BOT_COLOR),
    };
    let time = message.timestamp.with_timezone(&Local).format("%H:%M").to_string();

    let mut label_style = Style::default().fg(color).add_modifier(Modifier::BOLD);
    if selected {
        label_style = label_style.add_modifier(Modifier::REVERSED);
    }

    Line::from(vec![
        Span::styled(if selected { "▶ " } else { "  " }, Style::default().fg(color)),
        Span::styled(label, label_style),
        Span::styled(format!(" · {}", time), Style::default().fg(Color::DarkGray)),
    ])
}

fn message_lines(message: &Message, selected: bool) -> Vec<Line<'static>> {
    let mut lines = vec![message_header(message, selected)];
    lines.extend(render::message_body(message));
    lines.push(Line::default());
    lines
}

fn typing_lines(frame_no: u8) -> Vec<Line<'static>> {
    // Animated ellipsis: cycles through ".", "..", "..."
    let dots = ".".repeat(frame_no as usize + 1);
    vec![
        Line::from(vec![
            Span::raw("  "),
            Span::styled("트래블봇", Style::default().fg(BOT_COLOR).add_modifier(Modifier::BOLD)),
        ]),
        Line::from(Span::styled(
            format!("답변을 준비하고 있어요{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ]
}

/// Row counts past `u16::MAX` saturate rather than wrap around.
fn rows(count: usize) -> u16 {
    u16::try_from(count).unwrap_or(u16::MAX)
}

/// Rows `lines` take once wrapped to `width`.
fn wrapped_height(lines: &[Line<'static>], width: u16) -> u16 {
    rows(
        Paragraph::new(Text::from(lines.to_vec()))
            .wrap(Wrap { trim: false })
            .line_count(width),
    )
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if app.input_mode == InputMode::Normal {
            Color::Cyan
        } else {
            Color::DarkGray
        }))
        .title(" 대화 ");
    let inner = block.inner(area);

    // Store area for mouse hit-testing and dimensions for scroll calculations
    app.chat_area = Some(area);
    app.chat_height = inner.height;

    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut selected_span = None;
    let mut offset = 0u16;
    for (i, message) in app.controller.messages().iter().enumerate() {
        let selected = app.selected == Some(i);
        let block_lines = message_lines(message, selected);
        let height = wrapped_height(&block_lines, inner.width);
        if selected {
            selected_span = Some((offset, height));
        }
        offset = offset.saturating_add(height);
        lines.extend(block_lines);
    }
    if app.controller.is_sending() {
        lines.extend(typing_lines(app.animation_frame));
    }

    let chat = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });
    let total = rows(chat.line_count(inner.width));
    app.max_scroll = total.saturating_sub(inner.height);

    if let Some((start, height)) = selected_span {
        // Keep the selected message on screen
        app.follow = false;
        if start < app.scroll {
            app.scroll = start;
        } else if start.saturating_add(height) > app.scroll.saturating_add(inner.height) {
            app.scroll = start.saturating_add(height).saturating_sub(inner.height).min(start);
        }
    }
    if app.follow {
        app.scroll = app.max_scroll;
    }
    app.scroll = app.scroll.min(app.max_scroll);

    frame.render_widget(chat.block(block).scroll((app.scroll, 0)), area);
}

fn render_quick_actions(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = if app.controller.can_send() {
        Style::default().fg(Color::Black).bg(Color::Cyan)
    } else {
        Style::default().fg(Color::Black).bg(Color::DarkGray)
    };

    let mut spans = Vec::new();
    for (i, action) in QUICK_ACTIONS.iter().enumerate() {
        spans.push(Span::styled(format!(" {} ", i + 1), key_style));
        spans.push(Span::raw(format!(" {}  ", action.label)));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" 빠른 질문 (Esc 후 숫자) ");
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

/// The part of `input` that fits in `width` cells with the cursor visible,
/// and the cursor's column within it.
fn visible_input(input: &str, cursor: usize, width: usize) -> (String, u16) {
    if width == 0 {
        return (String::new(), 0);
    }
    let chars: Vec<char> = input.chars().collect();
    let cursor = cursor.min(chars.len());
    let cell_width = |slice: &[char]| Span::raw(slice.iter().collect::<String>()).width();

    // Drop characters from the left until the cursor fits
    let mut start = 0;
    while start < cursor && cell_width(&chars[start..cursor]) >= width {
        start += 1;
    }

    let mut visible = String::new();
    let mut used = 0;
    for c in &chars[start..] {
        let w = Span::raw(c.to_string()).width();
        if used + w > width {
            break;
        }
        used += w;
        visible.push(*c);
    }
    (visible, cell_width(&chars[start..cursor]) as u16)
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let enabled = app.controller.can_send();
    let editing = app.input_mode == InputMode::Editing;

    let border_color = if !enabled {
        Color::DarkGray
    } else if editing {
        Color::Yellow
    } else {
        Color::Gray
    };
    let title = if app.controller.is_sending() {
        " 답변을 기다리는 중 "
    } else if !app.controller.is_online() {
        " 오프라인 "
    } else {
        " 메시지 "
    };
    let count = app.input.chars().count();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title)
        .title(Title::from(format!(" {}자 ", count)).alignment(Alignment::Right));
    let inner = block.inner(area);

    let (visible, cursor_x) = visible_input(&app.input, app.cursor, inner.width as usize);
    let paragraph = if app.input.is_empty() {
        Paragraph::new(Span::styled(
            "여행에 대해 무엇이든 물어보세요",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let fg = if enabled { USER_COLOR } else { Color::DarkGray };
        Paragraph::new(visible).style(Style::default().fg(fg))
    };
    frame.render_widget(paragraph.block(block), area);

    // Show cursor when editing
    if editing && !app.show_clear_confirm {
        frame.set_cursor_position((inner.x + cursor_x, inner.y));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" 탐색 ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" 입력 ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [
            Span::styled(format!(" {} ", key), key_style),
            Span::styled(format!(" {} ", label), label_style),
        ]
    };

    let mut spans = vec![Span::styled(mode_text, mode_style)];

    if let Some(flash) = &app.flash {
        spans.push(Span::styled(format!(" {} ", flash), Style::default().fg(Color::LightGreen)));
    } else {
        match app.input_mode {
            InputMode::Editing => {
                spans.extend(hint("Enter", "전송"));
                spans.extend(hint("Esc", "목록"));
                spans.extend(hint("PgUp/PgDn", "스크롤"));
                spans.extend(hint("Ctrl+C", "종료"));
            }
            InputMode::Normal => {
                spans.extend(hint("i", "입력"));
                spans.extend(hint("j/k", "선택"));
                spans.extend(hint("y", "복사"));
                spans.extend(hint("d", "삭제"));
                spans.extend(hint("n", "새 대화"));
                spans.extend(hint("x", "전체 삭제"));
                if app.controller.error().is_some() {
                    spans.extend(hint("e", "알림 닫기"));
                }
                if app.show_quick_actions() {
                    spans.extend(hint("1-4", "빠른 질문"));
                }
                spans.extend(hint("q", "종료"));
            }
        }
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_clear_confirm(frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 44.min(area.width.saturating_sub(4));
    let popup_height = 5;

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height.min(area.height));

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::LightRed))
        .title(" 대화 삭제 ");

    let text = Text::from(vec![
        Line::from("대화를 모두 삭제할까요?"),
        Line::default(),
        Line::from(vec![
            Span::styled(" y ", Style::default().bg(Color::LightRed).fg(Color::Black)),
            Span::raw(" 삭제   "),
            Span::styled(" n ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" 취소"),
        ]),
    ]);
    frame.render_widget(
        Paragraph::new(text).alignment(Alignment::Center).block(block),
        popup_area,
    );
}
