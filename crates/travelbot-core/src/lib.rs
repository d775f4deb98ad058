pub mod config;
pub mod connectivity;
pub mod controller;
pub mod error;
pub mod payload;
pub mod state;
pub mod store;
pub mod transport;

// Re-export main types for convenience
pub use config::Config;
pub use connectivity::{probe_once, spawn_probe, ConnectivityMonitor, Probe};
pub use controller::{Completion, PendingSend, SendState, SessionController};
pub use error::{ChatError, Result, StoreError, TransportError};
pub use payload::{Accommodation, CurrencyConversion, Payload, PayloadKind, Place, Restaurant};
pub use state::{Conversation, Message, Role};
pub use store::{ConversationStore, FileStore, MemoryStore};
pub use transport::{ChatReply, ChatTransport, HttpTransport};
