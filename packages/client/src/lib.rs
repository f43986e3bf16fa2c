//! Atelier client library.
//!
//! Owns one channel to the relay per active collaboration session and the
//! client-side projections built from its event stream: presence, remote
//! canvas cursors, and per-buffer editor state. The UI layer consumes
//! these components; nothing here renders anything.

pub mod connection;
pub mod cursor;
pub mod editor;
pub mod error;
pub mod formatter;
pub mod presence;

pub use connection::{ClientConfig, ConnectionManager, ConnectionState, SessionEvent};
pub use cursor::CursorSync;
pub use editor::{EditorSync, RemoteChange};
pub use error::ClientError;
pub use presence::{ActiveUser, PresenceChange, PresenceTracker};
