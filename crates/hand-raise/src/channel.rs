//! Real-time data channel seam.
//!
//! The media SDK owns the actual transport. This crate only needs two things
//! from it: a way to publish a small payload to everyone in the room, and a
//! stream of inbound payloads. Inbound packets are handed to the coordinator
//! over an mpsc channel (see [`crate::HandRaiseCoordinator::inbound_sender`]).

use crate::errors::HandRaiseError;
use async_trait::async_trait;
use bytes::Bytes;

/// Delivery mode requested from the media SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reliability {
    /// Ordered, retransmitted delivery.
    Reliable,
    /// Best-effort delivery, may drop.
    Lossy,
}

/// One payload received from the data channel.
#[derive(Debug, Clone)]
pub struct InboundPacket {
    pub payload: Bytes,
    /// Media-session identity of the sender, when the SDK reports one.
    pub sender_identity: Option<String>,
    pub topic: Option<String>,
}

impl InboundPacket {
    /// Packet with no sender or topic metadata.
    #[must_use]
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            sender_identity: None,
            topic: None,
        }
    }

    #[must_use]
    pub fn with_sender(mut self, identity: impl Into<String>) -> Self {
        self.sender_identity = Some(identity.into());
        self
    }

    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }
}

/// Outbound side of the media session's data channel.
#[async_trait]
pub trait DataChannel: Send + Sync {
    /// Publish `payload` to all connected participants.
    async fn send(&self, payload: Vec<u8>, reliability: Reliability) -> Result<(), HandRaiseError>;
}

/// Channel for clients without a media session; every send fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisconnectedChannel;

#[async_trait]
impl DataChannel for DisconnectedChannel {
    async fn send(
        &self,
        _payload: Vec<u8>,
        _reliability: Reliability,
    ) -> Result<(), HandRaiseError> {
        Err(HandRaiseError::Channel(
            "real-time session not connected".to_string(),
        ))
    }
}
