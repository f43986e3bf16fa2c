//! Canvas cursor synchronization.
//!
//! Outbound: raw pointer positions are throttled to one send per window
//! and suppressed entirely for sub-pixel jitter. Inbound: a map of the
//! latest known remote cursor per connection, no interpolation.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use atelier_shared::protocol::CanvasCursorPayload;
use atelier_shared::types::{ConnectionId, UserId};

/// At most one outbound cursor message per this window.
pub const CURSOR_THROTTLE: Duration = Duration::from_millis(50);
/// Moves smaller than this in both axes are not worth sending.
pub const CURSOR_EPSILON: f64 = 2.0;

/// Latest known position of one remote cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCursor {
    pub user_id: UserId,
    pub user_name: String,
    pub color: String,
    pub x: f64,
    pub y: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy)]
struct SentSample {
    x: f64,
    y: f64,
    at: Instant,
}

/// Throttled outbound gate plus the inbound remote-cursor map.
pub struct CursorSync {
    throttle: Duration,
    epsilon: f64,
    last_sent: Option<SentSample>,
    remote: HashMap<ConnectionId, RemoteCursor>,
}

impl CursorSync {
    pub fn new() -> Self {
        Self::with_limits(CURSOR_THROTTLE, CURSOR_EPSILON)
    }

    pub fn with_limits(throttle: Duration, epsilon: f64) -> Self {
        Self {
            throttle,
            epsilon,
            last_sent: None,
            remote: HashMap::new(),
        }
    }

    /// Decide whether a local pointer position should be sent now.
    /// Records the sample as sent when it returns true.
    pub fn offer(&mut self, x: f64, y: f64, now: Instant) -> bool {
        if let Some(last) = self.last_sent {
            if now.duration_since(last.at) < self.throttle {
                return false;
            }
            // Sub-pixel jitter: suppressed even across windows.
            if (x - last.x).abs() < self.epsilon && (y - last.y).abs() < self.epsilon {
                return false;
            }
        }
        self.last_sent = Some(SentSample { x, y, at: now });
        true
    }

    /// Record a remote cursor; the latest message per connection wins.
    pub fn apply_remote(&mut self, payload: &CanvasCursorPayload) {
        self.remote.insert(
            payload.connection_id,
            RemoteCursor {
                user_id: payload.user_id.clone(),
                user_name: payload.user_name.clone(),
                color: payload.color.clone(),
                x: payload.x,
                y: payload.y,
                timestamp: payload.timestamp,
            },
        );
    }

    /// Drop every cursor belonging to a user who fully left the room.
    pub fn remove_user(&mut self, user_id: &UserId) {
        self.remote.retain(|_, cursor| &cursor.user_id != user_id);
    }

    /// Drop all remote cursors; used on terminal connection failure, when
    /// remote state can no longer be trusted to be current.
    pub fn clear_remote(&mut self) {
        self.remote.clear();
    }

    pub fn remote_cursors(&self) -> &HashMap<ConnectionId, RemoteCursor> {
        &self.remote
    }
}

impl Default for CursorSync {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_shared::types::RoomId;
    use serde_json::Map;

    fn payload(connection_id: ConnectionId, user_id: &str, x: f64, y: f64) -> CanvasCursorPayload {
        CanvasCursorPayload {
            group_id: RoomId::new("G1").unwrap(),
            connection_id,
            user_id: UserId::new(user_id),
            user_name: "Ada".to_string(),
            color: "#e6194b".to_string(),
            x,
            y,
            timestamp: 0,
            rest: Map::new(),
        }
    }

    #[test]
    fn hundred_updates_in_one_window_send_once() {
        let mut sync = CursorSync::with_limits(Duration::from_millis(50), 2.0);
        let start = Instant::now();

        let mut sent = 0;
        for i in 0u64..100 {
            if sync.offer(i as f64 * 10.0, 0.0, start + Duration::from_micros(i * 100)) {
                sent += 1;
            }
        }

        assert_eq!(sent, 1);
    }

    #[test]
    fn next_window_sends_again() {
        let mut sync = CursorSync::with_limits(Duration::from_millis(50), 2.0);
        let start = Instant::now();

        assert!(sync.offer(0.0, 0.0, start));
        assert!(!sync.offer(100.0, 100.0, start + Duration::from_millis(10)));
        assert!(sync.offer(100.0, 100.0, start + Duration::from_millis(60)));
    }

    #[test]
    fn sub_epsilon_jitter_never_sends() {
        let mut sync = CursorSync::with_limits(Duration::from_millis(50), 2.0);
        let start = Instant::now();

        assert!(sync.offer(10.0, 10.0, start));
        // Past the window but within epsilon on both axes.
        assert!(!sync.offer(11.0, 10.5, start + Duration::from_millis(100)));
        assert!(!sync.offer(10.2, 11.9, start + Duration::from_millis(200)));
        // One axis moved enough.
        assert!(sync.offer(10.2, 13.0, start + Duration::from_millis(300)));
    }

    #[test]
    fn remote_map_keeps_latest_per_connection() {
        let mut sync = CursorSync::new();
        let conn = ConnectionId::generate();

        sync.apply_remote(&payload(conn, "u1", 10.0, 20.0));
        sync.apply_remote(&payload(conn, "u1", 30.0, 40.0));

        assert_eq!(sync.remote_cursors().len(), 1);
        let cursor = &sync.remote_cursors()[&conn];
        assert_eq!((cursor.x, cursor.y), (30.0, 40.0));
    }

    #[test]
    fn remove_user_clears_all_their_connections() {
        let mut sync = CursorSync::new();
        let tab1 = ConnectionId::generate();
        let tab2 = ConnectionId::generate();
        let other = ConnectionId::generate();

        sync.apply_remote(&payload(tab1, "u1", 1.0, 1.0));
        sync.apply_remote(&payload(tab2, "u1", 2.0, 2.0));
        sync.apply_remote(&payload(other, "u2", 3.0, 3.0));

        sync.remove_user(&UserId::new("u1"));

        assert_eq!(sync.remote_cursors().len(), 1);
        assert!(sync.remote_cursors().contains_key(&other));
    }
}
