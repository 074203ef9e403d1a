//! WebSocket Connection
//!
//! One chat session over WebSocket. Opening a [`Connection`] spawns a Tokio task
//! that performs the handshake, feeds inbound frames to the event handlers and
//! writes queued outbound frames. There is no reconnection: once the session
//! ends the connection stays closed.

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::connection::handlers::{CloseEvent, EventHandlers};
use crate::connection::protocol::{OutboundEnvelope, TargetType};
use crate::connection::state::{ConnectionState, ConnectionStateManager};

/// Close code reported when the peer's close frame carries no status
const NO_STATUS_RECEIVED: u16 = 1005;

/// Upper bound on the WebSocket handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// A live chat session
///
/// Dropping a `Connection` does not close the session; call
/// [`Connection::close`].
#[derive(Debug)]
pub struct Connection {
    url: String,
    sender: MessageSender,
}

impl Connection {
    /// Start connecting to `url`
    ///
    /// Returns immediately in [`ConnectionState::Connecting`]. Must be called
    /// from within a Tokio runtime.
    pub fn open(url: impl Into<String>, handlers: EventHandlers) -> Self {
        Self::open_with_timeout(url, handlers, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Like [`Connection::open`], failing the connection if the handshake
    /// takes longer than `connect_timeout`
    pub fn open_with_timeout(
        url: impl Into<String>,
        handlers: EventHandlers,
        connect_timeout: Duration,
    ) -> Self {
        let url = url.into();
        let state = ConnectionStateManager::new();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_connection(
            url.clone(),
            connect_timeout,
            state.clone(),
            outbound_rx,
            handlers,
        ));

        Self {
            url,
            sender: MessageSender {
                state,
                outbound: outbound_tx,
            },
        }
    }

    /// Send a chat message
    ///
    /// Returns `true` when the frame was handed to the transport, which only
    /// happens while the connection is connecting or open and `message` is
    /// non-empty. Delivery is not confirmed.
    pub fn send(&self, message: &str, target: i64, target_type: TargetType) -> bool {
        self.sender.send(message, target, target_type)
    }

    /// A cloneable send handle bound to this connection
    pub fn sender(&self) -> MessageSender {
        self.sender.clone()
    }

    /// Start the close handshake
    ///
    /// Frames already queued are written before the close frame. Closing a
    /// connection that is already closing or closed does nothing.
    pub fn close(&self) {
        let state = &self.sender.state;
        if !state.can_send() {
            return;
        }
        state.set_closing();

        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        if self
            .sender
            .outbound
            .send(Message::Close(Some(frame)))
            .is_err()
        {
            debug!("Connection task already finished");
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.sender.state.current_state()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wait until the handshake succeeded or failed; `true` if open
    pub async fn wait_until_settled(&self) -> bool {
        self.sender.state.wait_until_settled().await
    }

    /// Wait until the session has terminated
    pub async fn closed(&self) {
        self.sender.state.closed().await
    }
}

/// Send handle for one connection
#[derive(Debug, Clone)]
pub struct MessageSender {
    state: ConnectionStateManager,
    outbound: mpsc::UnboundedSender<Message>,
}

impl MessageSender {
    /// See [`Connection::send`]
    pub fn send(&self, message: &str, target: i64, target_type: TargetType) -> bool {
        if !self.state.can_send() {
            debug!(state = %self.state.current_state(), "Send rejected, connection not usable");
            return false;
        }
        if message.is_empty() {
            debug!("Send rejected, empty message");
            return false;
        }

        let json = match OutboundEnvelope::new(message, target, target_type).to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize outbound envelope");
                return false;
            }
        };

        self.outbound.send(Message::Text(json)).is_ok()
    }
}

/// Drive one session to completion
async fn run_connection(
    url: String,
    connect_timeout: Duration,
    state: ConnectionStateManager,
    mut outbound_rx: mpsc::UnboundedReceiver<Message>,
    handlers: EventHandlers,
) {
    let handshake = match timeout(connect_timeout, connect_async(url.as_str())).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!(
            "handshake timed out after {}ms",
            connect_timeout.as_millis()
        )),
    };
    let ws_stream = match handshake {
        Ok(stream) => stream,
        Err(e) => {
            (handlers.on_error)(&e);
            state.set_closed();
            (handlers.on_close)(&CloseEvent::abnormal());
            return;
        }
    };

    // A close requested during the handshake keeps the state at Closing.
    if state.set_open() {
        (handlers.on_open)();
    }

    let (mut write, mut read) = ws_stream.split();
    let mut outbound_open = true;

    let event = loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        (handlers.on_message)(text.as_str());
                    }
                    Some(Ok(Message::Close(frame))) => {
                        state.set_closing();
                        break match frame {
                            Some(frame) => CloseEvent::clean(frame.code.into(), frame.reason.to_string()),
                            None => CloseEvent::clean(NO_STATUS_RECEIVED, ""),
                        };
                    }
                    Some(Ok(Message::Binary(_))) => {
                        debug!("Received binary frame (ignored)");
                    }
                    Some(Ok(_)) => {
                        // Ping/pong are answered by the transport
                    }
                    Some(Err(e)) => {
                        (handlers.on_error)(&e.to_string());
                        break CloseEvent::abnormal();
                    }
                    None => {
                        break CloseEvent::abnormal();
                    }
                }
            }

            outgoing = outbound_rx.recv(), if outbound_open => {
                match outgoing {
                    Some(msg) => {
                        if let Err(e) = write.send(msg).await {
                            (handlers.on_error)(&e.to_string());
                            break CloseEvent::abnormal();
                        }
                    }
                    // Every handle was dropped; keep reading until the server closes
                    None => outbound_open = false,
                }
            }
        }
    };

    if event.was_clean {
        // Flushes the close reply; the session is over either way.
        let _ = write.close().await;
    }

    state.set_closed();
    (handlers.on_close)(&event);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached(state: ConnectionState) -> (MessageSender, mpsc::UnboundedReceiver<Message>) {
        let manager = ConnectionStateManager::new();
        match state {
            ConnectionState::Connecting => {}
            ConnectionState::Open => {
                manager.set_open();
            }
            ConnectionState::Closing => {
                manager.set_closing();
            }
            ConnectionState::Closed => {
                manager.set_closed();
            }
        }
        let (tx, rx) = mpsc::unbounded_channel();
        (
            MessageSender {
                state: manager,
                outbound: tx,
            },
            rx,
        )
    }

    #[test]
    fn test_send_on_open_connection() {
        let (sender, mut rx) = detached(ConnectionState::Open);

        assert!(sender.send("hello", 9, TargetType::Direct));

        match rx.try_recv().unwrap() {
            Message::Text(text) => assert_eq!(
                text.as_str(),
                r#"{"message":"hello","target":9,"targetType":"direct"}"#
            ),
            other => panic!("Expected text frame, got {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_while_connecting_is_queued() {
        let (sender, mut rx) = detached(ConnectionState::Connecting);

        assert!(sender.send("early", 4, TargetType::Group));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_empty_message_is_rejected_in_every_state() {
        for state in [
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Closing,
            ConnectionState::Closed,
        ] {
            let (sender, mut rx) = detached(state);
            assert!(!sender.send("", 9, TargetType::Direct), "state {}", state);
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn test_closing_and_closed_connections_reject_sends() {
        for state in [ConnectionState::Closing, ConnectionState::Closed] {
            let (sender, mut rx) = detached(state);
            assert!(!sender.send("hello", 9, TargetType::Direct), "state {}", state);
            assert!(rx.try_recv().is_err());
        }
    }
}
