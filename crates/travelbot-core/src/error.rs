use thiserror::Error;

/// Errors surfaced by the session controller.
///
/// None of these are fatal: the controller is back in `Idle` with a usable
/// conversation whenever one is returned.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("not connected to the network")]
    Offline,

    #[error("chat request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("a message is already being sent")]
    Busy,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failure of a single exchange with the chat backend.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("chat backend returned status {0}")]
    Status(u16),

    #[error("HTTP error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed chat response: {0}")]
    Decode(String),
}

/// Failure reading or writing the saved conversation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not determine data directory")]
    NoDataDir,
}

pub type Result<T> = std::result::Result<T, ChatError>;
