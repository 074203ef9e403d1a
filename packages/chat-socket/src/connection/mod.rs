//! Connection module
//!
//! This module handles the real-time link to the chat server, including the
//! WebSocket session, its lifecycle state and the message protocol.

pub mod handlers;
pub mod manager;
pub mod protocol;
pub mod state;
pub mod websocket;
