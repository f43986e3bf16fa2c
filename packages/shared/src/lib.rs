//! Shared types for the Atelier collaboration relay.
//!
//! This crate holds everything both sides of the wire need to agree on:
//! the event envelope, identity newtypes, the fixed set of editor buffers,
//! and small logging/time utilities used by both binaries.

pub mod logger;
pub mod protocol;
pub mod time;
pub mod types;

pub use protocol::{ClientFrame, RoomMember, SelfInfo, Selection, ServerFrame};
pub use types::{BufferKind, ConnectionId, RoomId, UserId, UserIdentity};
