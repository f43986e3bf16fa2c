//! Delivery seam between the room registry and the WebSocket tasks.
//!
//! The registry never touches a socket directly; it hands frames to an
//! [`EventSink`] per member. Production uses a channel into the member's
//! pusher task, tests substitute recording or failing sinks.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors raised when handing a frame to a member's channel.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    /// The member's pusher task is gone; the connection is dead or dying.
    #[error("receiver side of the connection channel is closed")]
    Closed,
}

/// Outbound delivery endpoint for one connected member.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Queue one serialized frame for delivery. Must not block on the
    /// remote peer; a slow or dead peer fails here instead of stalling
    /// fan-out to the rest of the room.
    async fn push(&self, frame: String) -> Result<(), SinkError>;
}

/// [`EventSink`] backed by the unbounded channel into a connection's
/// pusher task.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn push(&self, frame: String) -> Result<(), SinkError> {
        self.tx.send(frame).map_err(|_| SinkError::Closed)
    }
}
