//! Message Protocol
//!
//! Defines the frames exchanged between the chat client and server.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether a message is addressed to a single user or a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Direct,
    Group,
}

impl std::fmt::Display for TargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetType::Direct => write!(f, "direct"),
            TargetType::Group => write!(f, "group"),
        }
    }
}

/// Envelope sent from the client to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEnvelope {
    pub message: String,
    pub target: i64,
    pub target_type: TargetType,
}

impl OutboundEnvelope {
    pub fn new(message: impl Into<String>, target: i64, target_type: TargetType) -> Self {
        Self {
            message: message.into(),
            target,
            target_type,
        }
    }

    /// Serialize the envelope to JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Errors raised while decoding an inbound frame
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not a chat payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The part of an inbound frame the client inspects; everything else is opaque
#[derive(Debug, Clone, Deserialize)]
struct InboundHeader {
    user: SenderRef,
}

#[derive(Debug, Clone, Deserialize)]
struct SenderRef {
    id: i64,
}

/// Extract the sender id (`user.id`) from a raw inbound frame
pub fn sender_id(frame: &str) -> Result<i64, FrameError> {
    let header: InboundHeader = serde_json::from_str(frame)?;
    Ok(header.user.id)
}
