//! Connection State Management
//!
//! Tracks the lifecycle of a single chat connection. The state is published
//! through a watch channel so async callers can wait on transitions.

use std::sync::Arc;
use tokio::sync::watch;

/// Lifecycle states of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake in progress
    Connecting,
    /// Session established
    Open,
    /// Close requested, handshake not finished
    Closing,
    /// Session terminated
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Closing => write!(f, "Closing"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

/// Thread-safe connection state manager
#[derive(Clone)]
pub struct ConnectionStateManager {
    tx: Arc<watch::Sender<ConnectionState>>,
}

impl ConnectionStateManager {
    /// Create a new state manager starting in Connecting state
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Connecting);
        Self { tx: Arc::new(tx) }
    }

    /// Get the current state
    pub fn current_state(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    /// Transition to a new state
    pub fn transition_to(&self, new_state: ConnectionState) -> bool {
        let mut old_state = new_state;
        let accepted = self.tx.send_if_modified(|current| {
            old_state = *current;
            if !Self::is_valid_transition(*current, new_state) {
                return false;
            }
            *current = new_state;
            old_state != new_state
        });

        if accepted {
            tracing::debug!(from = %old_state, to = %new_state, "Connection state transition");
            true
        } else {
            old_state == new_state
        }
    }

    /// Check if a state transition is valid
    fn is_valid_transition(from: ConnectionState, to: ConnectionState) -> bool {
        // Self-transition is always allowed
        if from == to {
            return true;
        }

        matches!(
            (from, to),
            // From Connecting
            (ConnectionState::Connecting, ConnectionState::Open) |
            (ConnectionState::Connecting, ConnectionState::Closing) |
            (ConnectionState::Connecting, ConnectionState::Closed) |
            // From Open
            (ConnectionState::Open, ConnectionState::Closing) |
            (ConnectionState::Open, ConnectionState::Closed) |
            // From Closing
            (ConnectionState::Closing, ConnectionState::Closed)
        )
    }

    pub fn set_open(&self) -> bool {
        self.transition_to(ConnectionState::Open)
    }

    pub fn set_closing(&self) -> bool {
        self.transition_to(ConnectionState::Closing)
    }

    pub fn set_closed(&self) -> bool {
        self.transition_to(ConnectionState::Closed)
    }

    /// Whether the connection still accepts outbound frames
    pub fn can_send(&self) -> bool {
        matches!(
            self.current_state(),
            ConnectionState::Connecting | ConnectionState::Open
        )
    }

    pub fn is_open(&self) -> bool {
        self.current_state() == ConnectionState::Open
    }

    /// Wait until the handshake has either succeeded or failed
    ///
    /// Returns `true` if the connection is open at that point.
    pub async fn wait_until_settled(&self) -> bool {
        let mut rx = self.tx.subscribe();
        let settled = match rx
            .wait_for(|state| *state != ConnectionState::Connecting)
            .await
        {
            Ok(state) => *state == ConnectionState::Open,
            Err(_) => false,
        };
        settled
    }

    /// Wait until the connection is closed
    pub async fn closed(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx
            .wait_for(|state| *state == ConnectionState::Closed)
            .await;
    }
}

impl Default for ConnectionStateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionStateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ConnectionStateManager")
            .field(&self.current_state())
            .finish()
    }
}
