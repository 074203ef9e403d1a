//! Chat Socket Library
//!
//! This crate provides the client side of a real-time chat: a single WebSocket
//! connection to the chat server, a best-effort message sender and an
//! observable store holding the most recently received message.

pub mod config;
pub mod connection;
pub mod storage;
pub mod store;

// Re-exports for convenience
pub use config::{ClientConfig, ConfigError};
pub use connection::handlers::{CloseEvent, EventHandlers};
pub use connection::manager::{chat_endpoint, ConnectionManager};
pub use connection::protocol::{OutboundEnvelope, TargetType};
pub use connection::state::{ConnectionState, ConnectionStateManager};
pub use connection::websocket::{Connection, MessageSender};
pub use storage::{FileStorage, LocalStorage, MemoryStorage, StorageError, TOKEN_KEY};
pub use store::{MessageStore, Subscription};
