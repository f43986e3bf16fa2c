//! Atelier relay server.
//!
//! A single long-lived process holding an in-memory registry of rooms.
//! Inbound events are routed verbatim to every other connection in the
//! same room; nothing is persisted and a restart drops all rooms.

pub mod handler;
pub mod registry;
pub mod runner;
pub mod signal;
pub mod sink;
pub mod state;

pub use runner::{RelayConfig, router, run_server};
pub use state::AppState;
