//! Identity and id newtypes shared by the relay and the client.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum accepted length for a room identifier.
const ROOM_ID_MAX_LEN: usize = 128;

/// Errors raised when validating identifiers supplied by the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// Room identifier was empty or whitespace-only
    #[error("room id must not be empty")]
    EmptyRoomId,

    /// Room identifier exceeded the maximum length
    #[error("room id exceeds {ROOM_ID_MAX_LEN} characters")]
    RoomIdTooLong,

    /// Buffer kind string did not name one of the three editors
    #[error("unknown buffer kind '{0}'")]
    UnknownBufferKind(String),
}

/// Opaque identifier of a collaboration group (one room per group).
///
/// Validated once at the boundary; an empty or oversized id is rejected
/// before a connection is admitted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Result<Self, IdentityError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(IdentityError::EmptyRoomId);
        }
        if id.len() > ROOM_ID_MAX_LEN {
            return Err(IdentityError::RoomIdTooLong);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomId {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-assigned identifier of one live channel.
///
/// Unrelated to user identity: two tabs of the same user hold two distinct
/// connection ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh connection id. Only the relay does this.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Caller-supplied user identifier, treated as already authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity attached to a connection at handshake time.
///
/// The relay trusts these fields as-is; authentication happened upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub user_id: UserId,
    pub user_email: String,
    pub user_name: String,
    pub user_image: String,
}

/// One of the three fixed text buffers being collaboratively edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferKind {
    Markup,
    Style,
    Script,
}

impl BufferKind {
    pub const ALL: [BufferKind; 3] = [BufferKind::Markup, BufferKind::Style, BufferKind::Script];

    pub fn as_str(self) -> &'static str {
        match self {
            BufferKind::Markup => "markup",
            BufferKind::Style => "style",
            BufferKind::Script => "script",
        }
    }

    /// Stable index for per-buffer arrays.
    pub fn index(self) -> usize {
        match self {
            BufferKind::Markup => 0,
            BufferKind::Style => 1,
            BufferKind::Script => 2,
        }
    }
}

impl FromStr for BufferKind {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "markup" => Ok(BufferKind::Markup),
            "style" => Ok(BufferKind::Style),
            "script" => Ok(BufferKind::Script),
            other => Err(IdentityError::UnknownBufferKind(other.to_string())),
        }
    }
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display colors assigned to connections, cycled in join order.
pub const CURSOR_PALETTE: [&str; 10] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#46f0f0", "#f032e6", "#bcf60c",
    "#008080", "#9a6324",
];

/// Pick a palette color for the nth connection admitted to a room.
pub fn color_for_index(n: usize) -> &'static str {
    CURSOR_PALETTE[n % CURSOR_PALETTE.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_id_rejects_empty_and_whitespace() {
        assert_eq!(RoomId::new(""), Err(IdentityError::EmptyRoomId));
        assert_eq!(RoomId::new("   "), Err(IdentityError::EmptyRoomId));
    }

    #[test]
    fn room_id_rejects_oversized() {
        let id = "g".repeat(ROOM_ID_MAX_LEN + 1);
        assert_eq!(RoomId::new(id), Err(IdentityError::RoomIdTooLong));
    }

    #[test]
    fn room_id_accepts_plain_identifier() {
        let id = RoomId::new("G1").unwrap();
        assert_eq!(id.as_str(), "G1");
    }

    #[test]
    fn buffer_kind_round_trips_through_str() {
        for kind in BufferKind::ALL {
            assert_eq!(kind.as_str().parse::<BufferKind>().unwrap(), kind);
        }
        assert!("canvas".parse::<BufferKind>().is_err());
    }

    #[test]
    fn buffer_kind_serializes_lowercase() {
        let json = serde_json::to_string(&BufferKind::Script).unwrap();
        assert_eq!(json, "\"script\"");
    }

    #[test]
    fn palette_cycles_past_its_length() {
        assert_eq!(color_for_index(0), CURSOR_PALETTE[0]);
        assert_eq!(color_for_index(CURSOR_PALETTE.len()), CURSOR_PALETTE[0]);
        assert_eq!(color_for_index(CURSOR_PALETTE.len() + 3), CURSOR_PALETTE[3]);
    }
}
