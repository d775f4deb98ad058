use ratatui::layout::Rect;
use tokio::sync::mpsc;
use travelbot_core::{ChatError, ChatReply, Completion, PendingSend, SessionController, TransportError};

use crate::tui::{self, AppEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Moving through the message list.
    Normal,
    /// Typing into the message box.
    Editing,
}

pub struct QuickAction {
    pub label: &'static str,
    pub query: &'static str,
}

/// Canned prompts offered while the conversation holds only the greeting.
pub const QUICK_ACTIONS: [QuickAction; 4] = [
    QuickAction {
        label: "숙소 추천받기",
        query: "서울에서 추천 호텔 알려줘",
    },
    QuickAction {
        label: "맛집 찾기",
        query: "부산에서 인기 있는 맛집 추천해줘",
    },
    QuickAction {
        label: "관광지 탐색하기",
        query: "제주도에서 가볼 만한 관광지 알려줘",
    },
    QuickAction {
        label: "환율 변환",
        query: "100달러를 원화로 환전하면 얼마야?",
    },
];

/// Ticks a flash message stays visible (300ms each).
const FLASH_TICKS: u8 = 7;

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub controller: SessionController,

    // Message box
    pub input: String,
    pub cursor: usize, // cursor position in chars

    // Message list
    pub selected: Option<usize>,
    pub scroll: u16,
    /// Keep the newest message in view.
    pub follow: bool,
    pub max_scroll: u16,  // updated during render
    pub chat_height: u16, // updated during render
    pub chat_area: Option<Rect>,

    // Overlays
    pub show_clear_confirm: bool,
    pub flash: Option<String>,
    flash_ticks: u8,

    // Animation state
    pub animation_frame: u8, // 0-2 for the typing indicator

    events: mpsc::UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(controller: SessionController, events: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            controller,
            input: String::new(),
            cursor: 0,
            selected: None,
            scroll: 0,
            follow: true,
            max_scroll: 0,
            chat_height: 0,
            chat_area: None,
            show_clear_confirm: false,
            flash: None,
            flash_ticks: 0,
            animation_frame: 0,
            events,
        }
    }

    pub fn show_quick_actions(&self) -> bool {
        self.controller.conversation().is_fresh()
    }

    /// Start sending `text`. Returns whether a request went out.
    pub fn send(&mut self, text: &str) -> bool {
        let pending = match self.controller.begin_send(text) {
            Ok(Some(pending)) => pending,
            Ok(None) => return false,
            Err(ChatError::Busy) => {
                tracing::debug!("send ignored: request in flight");
                return false;
            }
            Err(e) => {
                tracing::debug!(error = %e, "send not started");
                return false;
            }
        };

        self.follow = true;
        self.selected = None;

        let transport = self.controller.transport();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = transport.send(pending.text(), pending.session_id()).await;
            let _ = events.send(AppEvent::Reply(pending, result));
        });
        true
    }

    /// Send the message box contents; the box is cleared only if the message
    /// was accepted, so an offline attempt keeps the text for a retry.
    pub fn submit_input(&mut self) {
        if self.controller.is_sending() {
            return;
        }
        let text = self.input.clone();
        if self.send(&text) {
            self.input.clear();
            self.cursor = 0;
        }
    }

    pub fn quick_action(&mut self, index: usize) {
        if !self.show_quick_actions() {
            return;
        }
        if let Some(action) = QUICK_ACTIONS.get(index) {
            self.send(action.query);
        }
    }

    pub fn on_reply(
        &mut self,
        pending: PendingSend,
        result: std::result::Result<ChatReply, TransportError>,
    ) {
        match self.controller.complete_send(pending, result) {
            Ok(Completion::Applied) => self.follow = true,
            Ok(Completion::Discarded) => {}
            // the controller already set the banner
            Err(_) => self.follow = true,
        }
    }

    pub fn new_conversation(&mut self) {
        self.controller.reset_conversation();
        self.selected = None;
        self.follow = true;
        self.scroll = 0;
    }

    pub fn request_clear(&mut self) {
        self.show_clear_confirm = true;
    }

    pub fn confirm_clear(&mut self) {
        self.show_clear_confirm = false;
        self.new_conversation();
        self.set_flash("대화를 모두 삭제했어요");
    }

    pub fn cancel_clear(&mut self) {
        self.show_clear_confirm = false;
    }

    // Message selection
    pub fn select_next(&mut self) {
        let len = self.controller.messages().len();
        if len == 0 {
            return;
        }
        self.selected = Some(match self.selected {
            Some(i) => (i + 1).min(len - 1),
            None => len - 1,
        });
    }

    pub fn select_prev(&mut self) {
        let len = self.controller.messages().len();
        if len == 0 {
            return;
        }
        self.selected = Some(match self.selected {
            Some(i) => i.saturating_sub(1),
            None => len - 1,
        });
    }

    /// Delete the selected message. The greeting cannot be deleted from here.
    pub fn delete_selected(&mut self) {
        let Some(index) = self.selected else {
            return;
        };
        let Some(message) = self.controller.messages().get(index) else {
            return;
        };
        if message.is_welcome() {
            self.set_flash("환영 메시지는 삭제할 수 없어요");
            return;
        }

        let id = message.id.clone();
        if self.controller.delete_message(&id) {
            let len = self.controller.messages().len();
            self.selected = if len == 0 { None } else { Some(index.min(len - 1)) };
        }
    }

    pub fn copy_selected(&mut self) {
        let Some(message) = self.selected.and_then(|i| self.controller.messages().get(i)) else {
            return;
        };
        match tui::copy_to_clipboard(&message.content) {
            Ok(()) => self.set_flash("복사했어요"),
            Err(e) => tracing::warn!(error = %e, "clipboard copy failed"),
        }
    }

    // Scrolling
    pub fn scroll_up(&mut self, lines: u16) {
        self.follow = false;
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines).min(self.max_scroll);
        if self.scroll >= self.max_scroll {
            self.follow = true;
        }
    }

    pub fn half_page(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }

    pub fn set_flash(&mut self, text: &str) {
        self.flash = Some(text.to_string());
        self.flash_ticks = FLASH_TICKS;
    }

    /// Called on every tick event.
    pub fn tick(&mut self) {
        if self.controller.is_sending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        if self.flash_ticks > 0 {
            self.flash_ticks -= 1;
            if self.flash_ticks == 0 {
                self.flash = None;
            }
        }
        if let Some(online) = self.controller.connectivity_changed() {
            self.set_flash(if online { "다시 온라인이 되었어요" } else { "오프라인 상태가 되었어요" });
        }
    }
}
