//! Event Handlers
//!
//! The four lifecycle callbacks a connection invokes. They run synchronously
//! on the connection task, one event at a time.

use tracing::{error, info, warn};

use crate::connection::protocol::sender_id;
use crate::store::MessageStore;

/// Close code reported when the session ends without a close handshake
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Details of a terminated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    pub code: u16,
    pub reason: String,
    /// `true` when the close handshake completed
    pub was_clean: bool,
}

impl CloseEvent {
    pub fn clean(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            was_clean: true,
        }
    }

    pub fn abnormal() -> Self {
        Self {
            code: ABNORMAL_CLOSURE,
            reason: String::new(),
            was_clean: false,
        }
    }
}

pub type OpenHandler = Box<dyn Fn() + Send + Sync>;
pub type MessageHandler = Box<dyn Fn(&str) + Send + Sync>;
pub type CloseHandler = Box<dyn Fn(&CloseEvent) + Send + Sync>;
pub type ErrorHandler = Box<dyn Fn(&str) + Send + Sync>;

/// Lifecycle callbacks for one connection
pub struct EventHandlers {
    pub on_open: OpenHandler,
    pub on_message: MessageHandler,
    pub on_close: CloseHandler,
    pub on_error: ErrorHandler,
}

impl EventHandlers {
    /// Handlers for a chat session
    ///
    /// Frames sent by anyone other than `local_user_id` are written verbatim
    /// into `store`. Frames that do not carry an integer `user.id` are dropped.
    pub fn chat(local_user_id: i64, store: MessageStore) -> Self {
        Self {
            on_open: Box::new(|| info!("[open] Connection established")),
            on_message: Box::new(move |data: &str| match sender_id(data) {
                Ok(sender) => {
                    if sender != local_user_id {
                        store.set(data);
                    }
                    info!(data = %data, sender, "[message] Data received from server");
                }
                Err(e) => {
                    warn!(error = %e, data = %data, "[message] Dropping malformed frame");
                }
            }),
            on_close: Box::new(|event: &CloseEvent| {
                if event.was_clean {
                    info!(
                        code = event.code,
                        reason = %event.reason,
                        "[close] Connection closed cleanly"
                    );
                } else {
                    warn!(code = event.code, "[close] Connection died");
                }
            }),
            on_error: Box::new(|e: &str| error!(error = %e, "[error] Connection error")),
        }
    }
}

impl Default for EventHandlers {
    /// Handlers that do nothing
    fn default() -> Self {
        Self {
            on_open: Box::new(|| {}),
            on_message: Box::new(|_: &str| {}),
            on_close: Box::new(|_: &CloseEvent| {}),
            on_error: Box::new(|_: &str| {}),
        }
    }
}

impl std::fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandlers").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_own_frames_do_not_reach_store() {
        let store = MessageStore::new();
        let handlers = EventHandlers::chat(7, store.clone());

        (handlers.on_message)(r#"{"user":{"id":7},"text":"hi"}"#);

        assert_eq!(store.get(), "");
    }

    #[test]
    fn test_foreign_frames_are_stored_verbatim() {
        let store = MessageStore::new();
        let handlers = EventHandlers::chat(7, store.clone());

        let frame = r#"{"user":{"id":9},"text":"hi"}"#;
        (handlers.on_message)(frame);

        assert_eq!(store.get(), frame);
    }

    #[test]
    fn test_store_keeps_last_foreign_frame() {
        let store = MessageStore::new();
        let handlers = EventHandlers::chat(7, store.clone());

        (handlers.on_message)(r#"{"user":{"id":9},"text":"one"}"#);
        (handlers.on_message)(r#"{"user":{"id":7},"text":"mine"}"#);
        (handlers.on_message)(r#"{"user":{"id":11},  "text":"two"}"#);

        assert_eq!(store.get(), r#"{"user":{"id":11},  "text":"two"}"#);
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let store = MessageStore::new();
        store.set("previous");
        let handlers = EventHandlers::chat(7, store.clone());

        (handlers.on_message)("plain text");
        (handlers.on_message)(r#"{"text":"no user"}"#);

        assert_eq!(store.get(), "previous");
    }

    #[test]
    fn test_lifecycle_handlers_do_not_touch_store() {
        let store = MessageStore::new();
        let handlers = EventHandlers::chat(7, store.clone());

        (handlers.on_open)();
        (handlers.on_close)(&CloseEvent::clean(1000, "bye"));
        (handlers.on_close)(&CloseEvent::abnormal());
        (handlers.on_error)("boom");

        assert_eq!(store.get(), "");
    }
}
