//! Maps a message to its presentation: markdown text, then the card for its
//! payload kind, if any.

use ratatui::{
    style::{Color, Style},
    text::Line,
};
use travelbot_core::{Message, Payload, Role};

use crate::cards;
use crate::markdown;

pub fn base_style(role: Role) -> Style {
    match role {
        Role::User => Style::default().fg(Color::White),
        Role::Bot => Style::default(),
    }
}

/// Lines for the cards attached to a reply.
pub fn payload_lines(payload: &Payload) -> Vec<Line<'static>> {
    match payload {
        Payload::Accommodations { results } => cards::list(results, cards::accommodation),
        Payload::Restaurants { results } => cards::list(results, cards::restaurant),
        Payload::Places { results } => cards::list(results, cards::place),
        Payload::Currency(conversion) => cards::currency(conversion),
    }
}

/// Everything below a message's header line.
pub fn message_body(message: &Message) -> Vec<Line<'static>> {
    let mut lines = markdown::render(&message.content, base_style(message.role));

    if let Some(payload) = &message.payload {
        let cards = payload_lines(payload);
        if !cards.is_empty() {
            if !lines.is_empty() {
                lines.push(Line::default());
            }
            lines.extend(cards);
        }
    }
    lines
}

/// Plain-text rendition, for output outside the TUI.
pub fn message_text(message: &Message) -> String {
    markdown::to_plain(&message_body(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use travelbot_core::{CurrencyConversion, Restaurant};

    fn bot(content: &str, payload: Option<Payload>) -> Message {
        Message::bot(content, payload)
    }

    #[test]
    fn test_plain_message() {
        let message = bot("**안녕하세요**", None);
        assert_eq!(message_text(&message), "안녕하세요");
    }

    #[test]
    fn test_currency_dispatch() {
        let message = bot(
            "변환 결과입니다",
            Some(Payload::Currency(CurrencyConversion {
                from: "USD".to_string(),
                to: "KRW".to_string(),
                amount: 100.0,
                converted: 132000.0,
                rate: 1320.0,
                timestamp: "2024-01-01T00:00:00".to_string(),
            })),
        );
        let text = message_text(&message);
        assert!(text.starts_with("변환 결과입니다\n\n│ 💱 환율 변환"));
    }

    #[test]
    fn test_empty_text_with_cards() {
        let message = bot(
            "",
            Some(Payload::Restaurants {
                results: vec![Restaurant {
                    id: String::new(),
                    name: "밀면집".to_string(),
                    address: "부산".to_string(),
                    cuisine: "한식".to_string(),
                    price_range: "₩".to_string(),
                    rating: Some(4.0),
                    image: None,
                }],
            }),
        );
        assert!(message_text(&message).starts_with("│ 밀면집"));
    }

    #[test]
    fn test_empty_result_list_renders_text_only() {
        let message = bot("결과가 없어요", Some(Payload::Places { results: vec![] }));
        assert_eq!(message_text(&message), "결과가 없어요");
    }

    #[test]
    fn test_user_message_has_no_cards() {
        let message = Message::user("서울에서 추천 호텔 알려줘");
        assert_eq!(message_text(&message), "서울에서 추천 호텔 알려줘");
    }
}
