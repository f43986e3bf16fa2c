//! Shared relay state and the connection handshake query.

use serde::Deserialize;
use tokio::sync::Mutex;

use crate::registry::RoomRegistry;

/// Shared application state. The mutex is the only synchronization around
/// the room registry; every handler goes through it.
pub struct AppState {
    pub registry: Mutex<RoomRegistry>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(RoomRegistry::new()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Join handshake, carried as query parameters on the upgrade request
/// rather than as a first frame.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectQuery {
    pub group_id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_email: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub user_image: String,
}
