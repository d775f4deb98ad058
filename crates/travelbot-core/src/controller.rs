//! The session controller: owns one conversation and applies the
//! send/receive protocol to it.
//!
//! A send has two halves so an event loop can run the network exchange on a
//! separate task: [`SessionController::begin_send`] appends the user message
//! and hands out a [`PendingSend`] ticket, [`SessionController::complete_send`]
//! applies the reply. Every ticket carries the generation it was issued in;
//! resetting the conversation (or deleting the message a ticket answers)
//! moves to a new generation, and replies for old generations are dropped.

use std::sync::Arc;

use tokio::sync::watch;

use crate::connectivity::ConnectivityMonitor;
use crate::error::{ChatError, Result, TransportError};
use crate::state::{Conversation, Message, OFFLINE_ERROR, SEND_FAILED_ERROR};
use crate::store::ConversationStore;
use crate::transport::{ChatReply, ChatTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Idle,
    /// One request in flight; further sends are rejected.
    Sending,
}

/// Ticket for a request started by [`SessionController::begin_send`].
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSend {
    generation: u64,
    message_id: String,
    text: String,
    session_id: Option<String>,
}

impl PendingSend {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Session to send with, `None` before the backend assigned one.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Id of the user message this request answers.
    pub fn message_id(&self) -> &str {
        &self.message_id
    }
}

/// What [`SessionController::complete_send`] did with a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The bot reply was appended.
    Applied,
    /// The ticket was stale; nothing changed.
    Discarded,
}

struct InFlight {
    generation: u64,
    message_id: String,
}

pub struct SessionController {
    store: Box<dyn ConversationStore>,
    transport: Arc<dyn ChatTransport>,
    online: watch::Receiver<bool>,
    conversation: Conversation,
    state: SendState,
    error: Option<String>,
    generation: u64,
    in_flight: Option<InFlight>,
    initialized: bool,
}

impl SessionController {
    pub fn new(
        store: impl ConversationStore + 'static,
        transport: Arc<dyn ChatTransport>,
        connectivity: &ConnectivityMonitor,
    ) -> Self {
        Self {
            store: Box::new(store),
            transport,
            online: connectivity.subscribe(),
            conversation: Conversation {
                session_id: String::new(),
                messages: Vec::new(),
            },
            state: SendState::Idle,
            error: None,
            generation: 0,
            in_flight: None,
            initialized: false,
        }
    }

    /// Restore the saved conversation, or start from the welcome message.
    /// Only the first call has any effect.
    pub fn initialize(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;

        match self.store.load() {
            Some(conversation) => {
                tracing::info!(
                    messages = conversation.messages.len(),
                    has_session = conversation.session().is_some(),
                    "restored saved conversation"
                );
                self.conversation = conversation;
            }
            None => {
                tracing::info!("starting new conversation");
                self.conversation = Conversation::welcome();
            }
        }
        self.persist();
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn messages(&self) -> &[Message] {
        &self.conversation.messages
    }

    pub fn session_id(&self) -> Option<&str> {
        self.conversation.session()
    }

    pub fn state(&self) -> SendState {
        self.state
    }

    pub fn is_sending(&self) -> bool {
        self.state == SendState::Sending
    }

    /// Banner text for the last failure, if not yet dismissed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// The new reachability state if it changed since the last call.
    pub fn connectivity_changed(&mut self) -> Option<bool> {
        match self.online.has_changed() {
            Ok(true) => Some(*self.online.borrow_and_update()),
            _ => None,
        }
    }

    /// Whether the input should accept a new message right now.
    pub fn can_send(&self) -> bool {
        !self.is_sending() && self.is_online()
    }

    pub fn transport(&self) -> Arc<dyn ChatTransport> {
        Arc::clone(&self.transport)
    }

    /// Append the user's message and start a request.
    ///
    /// Returns `Ok(None)` for blank input. While offline nothing is appended,
    /// the offline banner is set and `ChatError::Offline` returned.
    pub fn begin_send(&mut self, text: &str) -> Result<Option<PendingSend>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        if self.is_sending() {
            return Err(ChatError::Busy);
        }
        if !self.is_online() {
            tracing::info!("send blocked: offline");
            self.error = Some(OFFLINE_ERROR.to_string());
            return Err(ChatError::Offline);
        }

        let message = Message::user(text);
        let message_id = message.id.clone();
        self.conversation.messages.push(message);
        self.error = None;
        self.state = SendState::Sending;
        self.generation += 1;
        self.in_flight = Some(InFlight {
            generation: self.generation,
            message_id: message_id.clone(),
        });
        self.persist();

        tracing::debug!(generation = self.generation, "message appended, awaiting reply");
        Ok(Some(PendingSend {
            generation: self.generation,
            message_id,
            text: text.to_string(),
            session_id: self.conversation.session().map(str::to_string),
        }))
    }

    /// Apply the outcome of the request `pending` started.
    ///
    /// A failure sets the generic banner and keeps the user message. Outcomes
    /// for stale tickets are dropped without touching any state.
    pub fn complete_send(
        &mut self,
        pending: PendingSend,
        result: std::result::Result<ChatReply, TransportError>,
    ) -> Result<Completion> {
        let current = matches!(
            &self.in_flight,
            Some(f) if f.generation == pending.generation && f.message_id == pending.message_id
        );
        if !current {
            tracing::debug!(generation = pending.generation, "discarding stale reply");
            return Ok(Completion::Discarded);
        }
        self.in_flight = None;
        self.state = SendState::Idle;

        match result {
            Ok(reply) => {
                if !reply.success {
                    tracing::info!("backend flagged the reply as unsuccessful");
                }
                tracing::debug!(
                    kind = reply.payload.as_ref().map_or("none", |p| p.kind().as_str()),
                    "reply received"
                );
                self.conversation
                    .messages
                    .push(Message::bot(reply.text, reply.payload));
                if let Some(session_id) = reply.session_id.filter(|s| !s.is_empty()) {
                    if self.conversation.session_id != session_id {
                        tracing::info!(%session_id, "session assigned");
                    }
                    self.conversation.session_id = session_id;
                }
                self.persist();
                Ok(Completion::Applied)
            }
            Err(e) => {
                tracing::warn!(error = %e, "chat request failed");
                self.error = Some(SEND_FAILED_ERROR.to_string());
                Err(ChatError::Transport(e))
            }
        }
    }

    /// Send one message and wait for the reply.
    pub async fn send_message(&mut self, text: &str) -> Result<()> {
        let Some(pending) = self.begin_send(text)? else {
            return Ok(());
        };
        let transport = self.transport();
        let result = transport.send(pending.text(), pending.session_id()).await;
        self.complete_send(pending, result).map(|_| ())
    }

    /// Remove the message with `id`. Returns whether one was removed.
    pub fn delete_message(&mut self, id: &str) -> bool {
        let Some(index) = self.conversation.messages.iter().position(|m| m.id == id) else {
            return false;
        };
        self.conversation.messages.remove(index);

        if self.in_flight.as_ref().is_some_and(|f| f.message_id == id) {
            // the reply would answer a message that is gone
            self.abandon_in_flight();
        }
        self.persist();
        true
    }

    /// Start over: welcome message only, no session, no saved record.
    pub fn reset_conversation(&mut self) {
        self.conversation = Conversation::welcome();
        self.error = None;
        self.abandon_in_flight();
        self.store.clear();
        tracing::info!("conversation reset");
    }

    fn abandon_in_flight(&mut self) {
        self.generation += 1;
        self.in_flight = None;
        self.state = SendState::Idle;
    }

    fn persist(&self) {
        if self.conversation.messages.is_empty() {
            return;
        }
        self.store.save(&self.conversation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{CurrencyConversion, Payload, PayloadKind};
    use crate::state::{Role, WELCOME_ID};
    use crate::store::{FileStore, MemoryStore};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted outcomes and records what it was asked to send.
    #[derive(Default)]
    struct ScriptedTransport {
        replies: Mutex<VecDeque<std::result::Result<ChatReply, TransportError>>>,
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl ScriptedTransport {
        fn with(replies: Vec<std::result::Result<ChatReply, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, Option<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn send(
            &self,
            text: &str,
            session_id: Option<&str>,
        ) -> std::result::Result<ChatReply, TransportError> {
            self.calls
                .lock()
                .unwrap()
                .push((text.to_string(), session_id.map(str::to_string)));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(TransportError::Status(503)))
        }
    }

    fn reply(text: &str, session_id: Option<&str>) -> std::result::Result<ChatReply, TransportError> {
        Ok(ChatReply {
            text: text.to_string(),
            payload: None,
            session_id: session_id.map(str::to_string),
            success: true,
        })
    }

    fn currency_reply() -> std::result::Result<ChatReply, TransportError> {
        Ok(ChatReply {
            text: "변환 결과입니다".to_string(),
            payload: Some(Payload::Currency(CurrencyConversion {
                from: "USD".to_string(),
                to: "KRW".to_string(),
                amount: 100.0,
                converted: 132000.0,
                rate: 1320.0,
                timestamp: "2024-01-01T00:00:00Z".to_string(),
            })),
            session_id: Some("s1".to_string()),
            success: true,
        })
    }

    struct Harness {
        controller: SessionController,
        store: MemoryStore,
        transport: Arc<ScriptedTransport>,
        connectivity: ConnectivityMonitor,
    }

    fn harness_with(store: MemoryStore, replies: Vec<std::result::Result<ChatReply, TransportError>>) -> Harness {
        let transport = ScriptedTransport::with(replies);
        let connectivity = ConnectivityMonitor::new(true);
        let mut controller = SessionController::new(store.clone(), transport.clone(), &connectivity);
        controller.initialize();
        Harness {
            controller,
            store,
            transport,
            connectivity,
        }
    }

    fn harness(replies: Vec<std::result::Result<ChatReply, TransportError>>) -> Harness {
        harness_with(MemoryStore::new(), replies)
    }

    #[test]
    fn test_initialize_fresh() {
        let h = harness(vec![]);
        assert!(h.controller.conversation().is_fresh());
        assert_eq!(h.controller.session_id(), None);
        assert_eq!(h.controller.state(), SendState::Idle);
        assert_eq!(h.controller.error(), None);
    }

    #[test]
    fn test_initialize_restores_saved() {
        let mut saved = Conversation::welcome();
        saved.session_id = "s9".to_string();
        saved.messages.push(Message::user("hello"));
        let store = MemoryStore::new();
        store.save(&saved);

        let h = harness_with(store, vec![]);
        assert_eq!(h.controller.conversation(), &saved);
        assert_eq!(h.controller.session_id(), Some("s9"));
    }

    #[test]
    fn test_initialize_malformed_falls_back_to_welcome() {
        let h = harness_with(MemoryStore::with_raw("{\"messages\": 12}"), vec![]);
        assert!(h.controller.conversation().is_fresh());
        assert_eq!(h.controller.error(), None);
    }

    #[test]
    fn test_initialize_runs_once() {
        let mut h = harness(vec![]);
        h.controller.delete_message(WELCOME_ID);
        h.controller.initialize();
        assert!(h.controller.messages().is_empty());
    }

    #[tokio::test]
    async fn test_blank_input_is_noop() {
        let mut h = harness(vec![]);
        h.controller.send_message("   \n").await.unwrap();
        assert_eq!(h.controller.messages().len(), 1);
        assert!(h.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_send_appends_exchange_and_adopts_session() {
        let mut h = harness(vec![currency_reply()]);
        h.controller
            .send_message("100달러를 원화로 환전하면 얼마야?")
            .await
            .unwrap();

        let messages = h.controller.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].id, WELCOME_ID);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "100달러를 원화로 환전하면 얼마야?");
        assert_eq!(messages[2].role, Role::Bot);
        assert_eq!(
            messages[2].payload.as_ref().map(|p| p.kind()),
            Some(PayloadKind::Currency)
        );
        assert_eq!(h.controller.session_id(), Some("s1"));
        assert_eq!(h.controller.state(), SendState::Idle);

        // first request went out without a session
        assert_eq!(h.transport.calls()[0].1, None);
        // and the exchange was saved
        assert_eq!(h.store.load().as_ref(), Some(h.controller.conversation()));
    }

    #[tokio::test]
    async fn test_send_from_empty_conversation() {
        let store = MemoryStore::with_raw(r#"{"sessionId":"","messages":[]}"#);
        let mut h = harness_with(store, vec![currency_reply()]);
        assert!(h.controller.messages().is_empty());

        h.controller
            .send_message("100달러를 원화로 환전하면 얼마야?")
            .await
            .unwrap();

        let messages = h.controller.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].payload.as_ref().map(|p| p.kind()), Some(PayloadKind::Currency));
        assert_eq!(h.controller.session_id(), Some("s1"));
    }

    #[tokio::test]
    async fn test_session_is_resent_and_never_cleared_by_omission() {
        let mut h = harness(vec![reply("one", Some("s1")), reply("two", None), reply("three", Some(""))]);

        h.controller.send_message("a").await.unwrap();
        h.controller.send_message("b").await.unwrap();
        h.controller.send_message("c").await.unwrap();

        assert_eq!(h.controller.session_id(), Some("s1"));
        let sessions: Vec<_> = h.transport.calls().into_iter().map(|(_, s)| s).collect();
        assert_eq!(sessions, vec![None, Some("s1".to_string()), Some("s1".to_string())]);
    }

    #[tokio::test]
    async fn test_session_follows_latest_response() {
        let mut h = harness(vec![reply("one", Some("s1")), reply("two", Some("s2"))]);
        h.controller.send_message("a").await.unwrap();
        h.controller.send_message("b").await.unwrap();
        assert_eq!(h.controller.session_id(), Some("s2"));
    }

    #[tokio::test]
    async fn test_offline_send_appends_nothing() {
        let mut h = harness(vec![reply("never", Some("s1"))]);
        h.connectivity.set_online(false);

        for text in ["a", "b", "c"] {
            let err = h.controller.send_message(text).await.unwrap_err();
            assert!(matches!(err, ChatError::Offline));
            assert_eq!(h.controller.messages().len(), 1);
            assert_eq!(h.controller.error(), Some(OFFLINE_ERROR));
        }
        assert!(h.transport.calls().is_empty());
        assert!(!h.controller.can_send());

        h.connectivity.set_online(true);
        assert_eq!(h.controller.connectivity_changed(), Some(true));
        h.controller.send_message("a").await.unwrap();
        assert_eq!(h.controller.messages().len(), 3);
        assert_eq!(h.controller.error(), None);
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_user_message() {
        let mut h = harness(vec![reply("one", Some("s1")), Err(TransportError::Status(500))]);
        h.controller.send_message("first").await.unwrap();

        let before = h.controller.messages().len();
        let err = h.controller.send_message("second").await.unwrap_err();

        assert!(matches!(err, ChatError::Transport(TransportError::Status(500))));
        assert_eq!(h.controller.messages().len(), before + 1);
        assert_eq!(h.controller.messages().last().unwrap().content, "second");
        assert_eq!(h.controller.error(), Some(SEND_FAILED_ERROR));
        assert_eq!(h.controller.session_id(), Some("s1"));
        assert_eq!(h.controller.state(), SendState::Idle);

        // retrying the same text works and clears the banner
        h.transport
            .replies
            .lock()
            .unwrap()
            .push_back(reply("ok", None));
        h.controller.send_message("second").await.unwrap();
        assert_eq!(h.controller.error(), None);
    }

    #[test]
    fn test_second_send_while_sending_is_rejected() {
        let mut h = harness(vec![]);
        let pending = h.controller.begin_send("first").unwrap().unwrap();
        assert!(h.controller.is_sending());
        assert!(!h.controller.can_send());

        let err = h.controller.begin_send("second").unwrap_err();
        assert!(matches!(err, ChatError::Busy));
        assert_eq!(h.controller.messages().len(), 2);

        let done = h.controller.complete_send(pending, reply("hi", Some("s1"))).unwrap();
        assert_eq!(done, Completion::Applied);
        assert!(h.controller.can_send());
    }

    #[test]
    fn test_reply_after_reset_is_discarded() {
        let mut h = harness(vec![]);
        let pending = h.controller.begin_send("hello").unwrap().unwrap();
        h.controller.reset_conversation();

        let done = h.controller.complete_send(pending, reply("late", Some("s1"))).unwrap();
        assert_eq!(done, Completion::Discarded);
        assert!(h.controller.conversation().is_fresh());
        assert_eq!(h.controller.session_id(), None);
    }

    #[test]
    fn test_failure_after_reset_is_discarded() {
        let mut h = harness(vec![]);
        let pending = h.controller.begin_send("hello").unwrap().unwrap();
        h.controller.reset_conversation();

        let done = h
            .controller
            .complete_send(pending, Err(TransportError::Status(502)))
            .unwrap();
        assert_eq!(done, Completion::Discarded);
        assert_eq!(h.controller.error(), None);
    }

    #[test]
    fn test_reply_to_deleted_message_is_discarded() {
        let mut h = harness(vec![]);
        let pending = h.controller.begin_send("hello").unwrap().unwrap();
        assert!(h.controller.delete_message(pending.message_id()));
        assert!(!h.controller.is_sending());

        let done = h.controller.complete_send(pending, reply("late", Some("s1"))).unwrap();
        assert_eq!(done, Completion::Discarded);
        assert_eq!(h.controller.messages().len(), 1);
    }

    #[test]
    fn test_reply_survives_unrelated_delete() {
        let mut h = harness(vec![]);
        let pending = h.controller.begin_send("hello").unwrap().unwrap();
        h.controller.delete_message(WELCOME_ID);

        let done = h.controller.complete_send(pending, reply("hi", None)).unwrap();
        assert_eq!(done, Completion::Applied);
        let contents: Vec<_> = h.controller.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hello", "hi"]);
    }

    #[tokio::test]
    async fn test_delete_removes_exactly_one_and_keeps_order() {
        let mut h = harness(vec![reply("r1", None), reply("r2", None)]);
        h.controller.send_message("q1").await.unwrap();
        h.controller.send_message("q2").await.unwrap();

        let ids: Vec<String> = h.controller.messages().iter().map(|m| m.id.clone()).collect();
        assert!(h.controller.delete_message(&ids[2]));

        let remaining: Vec<String> = h.controller.messages().iter().map(|m| m.id.clone()).collect();
        assert_eq!(remaining, vec![ids[0].clone(), ids[1].clone(), ids[3].clone(), ids[4].clone()]);
        assert_eq!(h.store.load().unwrap().messages.len(), 4);

        assert!(!h.controller.delete_message("missing"));
        assert_eq!(h.controller.messages().len(), 4);
    }

    #[test]
    fn test_deleting_everything_keeps_last_saved_record() {
        let mut h = harness(vec![]);
        h.controller.delete_message(WELCOME_ID);
        assert!(h.controller.messages().is_empty());

        let saved = h.store.load().unwrap();
        assert_eq!(saved.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_reset_is_idempotent_and_clears_store() {
        let mut h = harness(vec![reply("r1", Some("s1")), Err(TransportError::Status(500))]);
        h.controller.send_message("q1").await.unwrap();
        let _ = h.controller.send_message("q2").await;
        assert!(h.controller.error().is_some());

        h.controller.reset_conversation();
        let first = h.controller.messages().to_vec();
        assert!(h.controller.conversation().is_fresh());
        assert_eq!(h.controller.session_id(), None);
        assert_eq!(h.controller.error(), None);
        assert!(h.store.raw().is_none());

        h.controller.reset_conversation();
        assert!(h.controller.conversation().is_fresh());
        assert_eq!(h.controller.messages()[0].content, first[0].content);
        assert_eq!(h.controller.messages()[0].id, first[0].id);
        assert!(h.store.raw().is_none());
    }

    #[tokio::test]
    async fn test_restored_session_is_reused() {
        let mut saved = Conversation::welcome();
        saved.session_id = "kept".to_string();
        let store = MemoryStore::new();
        store.save(&saved);

        let mut h = harness_with(store, vec![reply("ok", None)]);
        h.controller.send_message("hi").await.unwrap();
        assert_eq!(h.transport.calls()[0].1.as_deref(), Some("kept"));
        assert_eq!(h.controller.session_id(), Some("kept"));
    }

    #[tokio::test]
    async fn test_unwritable_store_does_not_break_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "plain file").unwrap();
        let store = FileStore::with_path(blocker.join("chat_session.json"));

        let transport = ScriptedTransport::with(vec![reply("hi", Some("s1"))]);
        let connectivity = ConnectivityMonitor::new(true);
        let mut controller = SessionController::new(store, transport, &connectivity);
        controller.initialize();

        controller.send_message("hello").await.unwrap();
        assert_eq!(controller.messages().len(), 3);
        assert_eq!(controller.session_id(), Some("s1"));
        assert_eq!(controller.error(), None);

        let id = controller.messages()[1].id.clone();
        assert!(controller.delete_message(&id));
        controller.reset_conversation();
        assert!(controller.conversation().is_fresh());
    }

    #[test]
    fn test_dismiss_error() {
        let mut h = harness(vec![]);
        h.connectivity.set_online(false);
        let _ = h.controller.begin_send("x");
        assert!(h.controller.error().is_some());
        h.controller.dismiss_error();
        assert_eq!(h.controller.error(), None);
    }
}
