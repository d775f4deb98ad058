use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TransportError;
use crate::payload::Payload;
use crate::state::FALLBACK_REPLY;

/// A successful exchange with the chat backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    /// Never empty; the fallback text stands in for a missing reply.
    pub text: String,
    pub payload: Option<Payload>,
    /// Session the backend wants us to use from now on, if it named one.
    pub session_id: Option<String>,
    /// The backend's own success flag. `false` is only a hint; the text is
    /// still shown.
    pub success: bool,
}

/// One request per call, no retries.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, text: &str, session_id: Option<&str>) -> Result<ChatReply, TransportError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponse {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    data: Option<Value>,
}

impl From<ChatResponse> for ChatReply {
    fn from(response: ChatResponse) -> Self {
        let text = response
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| FALLBACK_REPLY.to_string());
        let session_id = response.session_id.filter(|s| !s.is_empty());

        Self {
            text,
            payload: response.data.and_then(Payload::from_value),
            session_id,
            success: response.success != Some(false),
        }
    }
}

/// Posts JSON to the backend's chat endpoint.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, text: &str, session_id: Option<&str>) -> Result<ChatReply, TransportError> {
        let request = ChatRequest {
            message: text,
            session_id: session_id.filter(|s| !s.is_empty()),
        };
        tracing::debug!(url = %self.url, has_session = request.session_id.is_some(), "sending chat message");

        let response = self.client.post(&self.url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        let chat_response: ChatResponse =
            serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))?;
        Ok(chat_response.into())
    }
}
