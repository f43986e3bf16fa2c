//! Error types for the Atelier client.

use thiserror::Error;

/// Client-specific errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The relay refused the join handshake (missing/invalid room or user id)
    #[error("handshake rejected by relay: {0}")]
    HandshakeRejected(String),

    /// All reconnect attempts are exhausted; terminal until restarted
    #[error("failed to reconnect after {0} attempts")]
    ReconnectExhausted(u32),
}
