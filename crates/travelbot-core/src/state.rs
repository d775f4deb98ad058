//! UI-agnostic conversation state types
//!
//! The serialized form of [`Conversation`] is the saved-session record, so the
//! field names here follow the record format rather than Rust conventions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::payload::{self, Payload};

/// Id of the synthesized greeting that opens every fresh conversation.
pub const WELCOME_ID: &str = "welcome";

pub const WELCOME_MESSAGE: &str = "안녕하세요! 👋 여행 플래너 트래블봇입니다. 숙소, 맛집, 관광지, 환율 변환까지 도와드릴게요. 오늘은 어떤 여행을 계획해볼까요?";

/// Substituted when the backend answers without any text.
pub const FALLBACK_REPLY: &str = "죄송합니다. 요청을 처리하지 못했어요.";

pub const OFFLINE_ERROR: &str =
    "인터넷에 연결되어 있지 않습니다. 네트워크 상태를 확인한 뒤 다시 시도해주세요.";

pub const SEND_FAILED_ERROR: &str = "메시지를 전송하지 못했습니다. 잠시 후 다시 시도해주세요.";

/// The sender of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub role: Role,
    /// Markdown text; may be empty for pure-data replies.
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(
        rename = "data",
        default,
        deserialize_with = "payload::lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub payload: Option<Payload>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            payload: None,
        }
    }

    pub fn bot(content: impl Into<String>, payload: Option<Payload>) -> Self {
        Self {
            id: new_message_id(),
            role: Role::Bot,
            content: content.into(),
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn welcome() -> Self {
        Self {
            id: WELCOME_ID.to_string(),
            role: Role::Bot,
            content: WELCOME_MESSAGE.to_string(),
            timestamp: Utc::now(),
            payload: None,
        }
    }

    pub fn is_welcome(&self) -> bool {
        self.id == WELCOME_ID
    }
}

/// Time-ordered unique id (UUID v7).
fn new_message_id() -> String {
    Uuid::now_v7().to_string()
}

/// One conversation: the backend session token plus the message thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Empty until the backend assigns a session.
    #[serde(default)]
    pub session_id: String,
    pub messages: Vec<Message>,
}

impl Conversation {
    /// The state every new conversation starts in.
    pub fn welcome() -> Self {
        Self {
            session_id: String::new(),
            messages: vec![Message::welcome()],
        }
    }

    pub fn session(&self) -> Option<&str> {
        if self.session_id.is_empty() {
            None
        } else {
            Some(&self.session_id)
        }
    }

    /// True while the thread holds nothing but the greeting.
    pub fn is_fresh(&self) -> bool {
        self.messages.len() == 1 && self.messages[0].is_welcome()
    }
}
