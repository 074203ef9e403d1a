//! Connection Manager
//!
//! Opens chat connections for a local user, reading the authentication token
//! from local storage and routing foreign messages into a shared store.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::connection::handlers::EventHandlers;
use crate::connection::websocket::{Connection, DEFAULT_CONNECT_TIMEOUT};
use crate::storage::{LocalStorage, TOKEN_KEY};
use crate::store::MessageStore;

/// Path of the chat endpoint below the configured base address
pub const CHAT_PATH: &str = "/chat/ws";

/// Build `<base>/chat/ws?token=<token>`, percent-encoding the token
pub fn chat_endpoint(websocket_api: &str, token: &str) -> String {
    format!(
        "{}{}?token={}",
        websocket_api,
        CHAT_PATH,
        urlencoding::encode(token)
    )
}

/// Factory for chat connections
pub struct ConnectionManager<S: LocalStorage> {
    websocket_api: String,
    storage: Arc<S>,
    store: MessageStore,
    connect_timeout: Duration,
}

impl<S: LocalStorage> ConnectionManager<S> {
    pub fn new(websocket_api: impl Into<String>, storage: Arc<S>, store: MessageStore) -> Self {
        Self {
            websocket_api: websocket_api.into(),
            storage,
            store,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Set the handshake timeout for new connections
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Open a connection for `local_user_id`
    ///
    /// The handshake starts immediately; the result is only observable through
    /// the connection state and the event handlers. A missing token is sent as
    /// an empty string. Must be called from within a Tokio runtime.
    pub fn create_connection(&self, local_user_id: i64) -> Connection {
        let token = self.read_token();
        info!(
            websocket_api = %self.websocket_api,
            user_id = local_user_id,
            has_token = !token.is_empty(),
            "Connecting to chat server"
        );

        let url = chat_endpoint(&self.websocket_api, &token);
        Connection::open_with_timeout(
            url,
            EventHandlers::chat(local_user_id, self.store.clone()),
            self.connect_timeout,
        )
    }

    fn read_token(&self) -> String {
        match self.storage.get_item(TOKEN_KEY) {
            Ok(token) => token.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Failed to read token from local storage");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_chat_endpoint() {
        assert_eq!(
            chat_endpoint("wss://chat.example.com", "abc123"),
            "wss://chat.example.com/chat/ws?token=abc123"
        );
    }

    #[test]
    fn test_chat_endpoint_encodes_token() {
        assert_eq!(
            chat_endpoint("ws://localhost:8080", "a b&c=d"),
            "ws://localhost:8080/chat/ws?token=a%20b%26c%3Dd"
        );
    }

    #[test]
    fn test_chat_endpoint_with_blank_token() {
        assert_eq!(
            chat_endpoint("ws://localhost:8080", ""),
            "ws://localhost:8080/chat/ws?token="
        );
    }

    #[tokio::test]
    async fn test_create_connection_uses_stored_token() {
        let storage = Arc::new(MemoryStorage::with_token("t0k"));
        // Port 9 (discard) is not expected to accept WebSocket handshakes.
        let manager = ConnectionManager::new("ws://127.0.0.1:9", storage, MessageStore::new());

        let conn = manager.create_connection(7);
        assert_eq!(conn.url(), "ws://127.0.0.1:9/chat/ws?token=t0k");
    }

    #[tokio::test]
    async fn test_create_connection_without_token() {
        let storage = Arc::new(MemoryStorage::new());
        let manager = ConnectionManager::new("ws://127.0.0.1:9", storage, MessageStore::new());

        let conn = manager.create_connection(7);
        assert_eq!(conn.url(), "ws://127.0.0.1:9/chat/ws?token=");
        assert!(!conn.wait_until_settled().await);
    }
}
