//! Saved-conversation persistence.
//!
//! Exactly one record is kept. Reading never fails from the caller's point of
//! view: a missing or malformed record is "no saved conversation". Writes are
//! best-effort and only logged on failure.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::StoreError;
use crate::state::Conversation;

/// Fixed key of the saved record.
pub const RECORD_KEY: &str = "chat_session";

pub trait ConversationStore: Send {
    /// The last saved conversation, or `None` if absent or unreadable.
    fn load(&self) -> Option<Conversation>;

    /// Overwrite the record. No-op for a conversation without messages.
    fn save(&self, conversation: &Conversation);

    /// Remove the record entirely.
    fn clear(&self);
}

/// Stores the record as a JSON file.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store in the default location (`<data dir>/travelbot/chat_session.json`)
    pub fn new() -> Result<Self, StoreError> {
        let data_dir = dirs::data_dir().ok_or(StoreError::NoDataDir)?;
        Ok(Self::with_path(
            data_dir.join("travelbot").join(format!("{}.json", RECORD_KEY)),
        ))
    }

    /// Store at a custom path (useful for testing)
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_load(&self) -> Result<Option<Conversation>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn try_save(&self, conversation: &Conversation) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string(conversation)?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, contents)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn try_clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl ConversationStore for FileStore {
    fn load(&self) -> Option<Conversation> {
        match self.try_load() {
            Ok(conversation) => conversation,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "could not restore saved conversation");
                None
            }
        }
    }

    fn save(&self, conversation: &Conversation) {
        if conversation.messages.is_empty() {
            return;
        }
        if let Err(e) = self.try_save(conversation) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to save conversation");
        }
    }

    fn clear(&self) {
        if let Err(e) = self.try_clear() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove saved conversation");
        }
    }
}

/// Keeps the serialized record in memory. Clones share the same slot, so a
/// test can hand one to a controller and inspect the other.
#[derive(Clone, Default)]
pub struct MemoryStore {
    record: Arc<Mutex<Option<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the slot with raw record text, valid or not.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            record: Arc::new(Mutex::new(Some(raw.into()))),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.record.lock().ok().and_then(|slot| slot.clone())
    }
}

impl ConversationStore for MemoryStore {
    fn load(&self) -> Option<Conversation> {
        let raw = self.raw()?;
        match serde_json::from_str(&raw) {
            Ok(conversation) => Some(conversation),
            Err(e) => {
                tracing::warn!(error = %e, "could not restore saved conversation");
                None
            }
        }
    }

    fn save(&self, conversation: &Conversation) {
        if conversation.messages.is_empty() {
            return;
        }
        match serde_json::to_string(conversation) {
            Ok(raw) => {
                if let Ok(mut slot) = self.record.lock() {
                    *slot = Some(raw);
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to save conversation"),
        }
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.record.lock() {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{Payload, Place};
    use crate::state::Message;

    fn sample() -> Conversation {
        let mut conversation = Conversation::welcome();
        conversation.session_id = "s-42".to_string();
        conversation.messages.push(Message::user("제주도에서 가볼 만한 관광지 알려줘"));
        conversation.messages.push(Message::bot(
            "추천 관광지입니다",
            Some(Payload::Places {
                results: vec![Place {
                    id: "p1".to_string(),
                    name: "한라산".to_string(),
                    address: "제주".to_string(),
                    category: vec!["nature".to_string()],
                    fee: None,
                    currency: None,
                    rating: Some(4.9),
                    image: None,
                }],
            }),
        ));
        conversation
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::with_path(dir.path().join("travelbot").join("chat_session.json"));
        let conversation = sample();

        store.save(&conversation);
        assert_eq!(store.load(), Some(conversation));
    }

    #[test]
    fn test_file_missing_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::with_path(dir.path().join("none.json"));
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_file_malformed_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat_session.json");
        fs::write(&path, r#"{"sessionId": 7, "messages": "nope"}"#).unwrap();

        let store = FileStore::with_path(&path);
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_file_empty_conversation_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::with_path(dir.path().join("chat_session.json"));
        let conversation = sample();
        store.save(&conversation);

        store.save(&Conversation {
            session_id: String::new(),
            messages: Vec::new(),
        });
        assert_eq!(store.load(), Some(conversation));
    }

    #[test]
    fn test_file_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::with_path(dir.path().join("chat_session.json"));
        store.save(&sample());
        assert!(store.path().exists());

        store.clear();
        assert!(!store.path().exists());
        assert_eq!(store.load(), None);

        // clearing twice is fine
        store.clear();
    }

    #[test]
    fn test_file_write_failures_are_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "plain file").unwrap();
        let store = FileStore::with_path(blocker.join("chat_session.json"));

        store.save(&sample());
        store.clear();
        assert_eq!(store.load(), None);
        assert_eq!(fs::read_to_string(&blocker).unwrap(), "plain file");
    }

    #[test]
    fn test_memory_store_shares_slot() {
        let store = MemoryStore::new();
        let observer = store.clone();
        let conversation = sample();
        store.save(&conversation);
        assert_eq!(observer.load(), Some(conversation));

        store.clear();
        assert!(observer.raw().is_none());
    }

    #[test]
    fn test_memory_store_malformed_is_absent() {
        let store = MemoryStore::with_raw("not json");
        assert_eq!(store.load(), None);
    }
}
