//! Editor synchronization over the three fixed buffers.
//!
//! Optimistic local, accept-if-newer remote: every originating connection
//! versions its own changes per buffer, and a receiver only applies a
//! change strictly newer than the last one it accepted from that
//! (connection, buffer) pair. Concurrent edits are not merged; the last
//! version wins.

use std::collections::HashMap;

use serde_json::Value;

use atelier_shared::protocol::{EditorChangePayload, EditorCursorPayload, Selection};
use atelier_shared::types::{BufferKind, ConnectionId, UserId};

/// Verdict on a received editor change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteChange {
    /// Newer than anything accepted from that (connection, buffer); apply it.
    Apply,
    /// Equal or older version; drop silently.
    Stale,
}

/// Latest known remote selection in one buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSelection {
    pub user_id: UserId,
    pub user_name: String,
    pub color: String,
    pub selection: Selection,
    pub timestamp: i64,
}

/// Client-side editor state for all three buffers.
#[derive(Debug, Default)]
pub struct EditorSync {
    /// Highest version accepted per (originating connection, buffer).
    last_accepted: HashMap<(ConnectionId, BufferKind), u64>,
    /// Local changes not yet acknowledged, per buffer.
    pending: [Vec<Value>; 3],
    /// Last selection actually sent, per buffer; duplicates are not resent.
    last_sent_selection: [Option<Selection>; 3],
    remote_selections: HashMap<(ConnectionId, BufferKind), RemoteSelection>,
}

impl EditorSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log a local change as pending until a peer acknowledges the batch.
    pub fn record_local_change(&mut self, buffer: BufferKind, change: Value) {
        self.pending[buffer.index()].push(change);
    }

    pub fn pending_len(&self, buffer: BufferKind) -> usize {
        self.pending[buffer.index()].len()
    }

    /// Gate a received change against the version history.
    ///
    /// Acknowledgements are accepted unconditionally and clear the pending
    /// log for that buffer; anything else must carry a strictly greater
    /// version than the last accepted one.
    pub fn apply_remote_change(&mut self, payload: &EditorChangePayload) -> RemoteChange {
        let key = (payload.connection_id, payload.buffer_kind);
        let last = self.last_accepted.entry(key).or_insert(0);

        if payload.is_acknowledgement {
            self.pending[payload.buffer_kind.index()].clear();
            if payload.version > *last {
                *last = payload.version;
            }
            return RemoteChange::Apply;
        }

        if payload.version > *last {
            *last = payload.version;
            RemoteChange::Apply
        } else {
            RemoteChange::Stale
        }
    }

    /// Whether a local selection differs from the last one sent for the
    /// buffer. Records it as sent when it does.
    pub fn selection_changed(&mut self, buffer: BufferKind, selection: Selection) -> bool {
        let slot = &mut self.last_sent_selection[buffer.index()];
        if *slot == Some(selection) {
            return false;
        }
        *slot = Some(selection);
        true
    }

    /// Record a remote caret/selection; latest per (connection, buffer) wins.
    pub fn apply_remote_selection(&mut self, payload: &EditorCursorPayload) {
        self.remote_selections.insert(
            (payload.connection_id, payload.buffer_kind),
            RemoteSelection {
                user_id: payload.user_id.clone(),
                user_name: payload.user_name.clone(),
                color: payload.color.clone(),
                selection: payload.selection,
                timestamp: payload.timestamp,
            },
        );
    }

    pub fn remote_selections(
        &self,
    ) -> &HashMap<(ConnectionId, BufferKind), RemoteSelection> {
        &self.remote_selections
    }

    /// Drop editor-cursor state belonging to a user who fully left.
    pub fn remove_user(&mut self, user_id: &UserId) {
        self.remote_selections
            .retain(|_, sel| &sel.user_id != user_id);
    }

    /// Drop all remote state; used on terminal connection failure.
    pub fn clear_remote(&mut self) {
        self.remote_selections.clear();
        self.last_accepted.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_shared::types::RoomId;
    use serde_json::{Map, json};

    fn change(
        connection_id: ConnectionId,
        buffer: BufferKind,
        version: u64,
        ack: bool,
    ) -> EditorChangePayload {
        EditorChangePayload {
            group_id: RoomId::new("G1").unwrap(),
            buffer_kind: buffer,
            connection_id,
            user_id: UserId::new("u1"),
            version,
            changes: json!({"insert": "x"}),
            is_acknowledgement: ack,
            rest: Map::new(),
        }
    }

    #[test]
    fn versions_1_3_2_4_accept_all_but_the_stale_2() {
        let mut sync = EditorSync::new();
        let conn = ConnectionId::generate();

        let verdicts: Vec<RemoteChange> = [1, 3, 2, 4]
            .iter()
            .map(|v| sync.apply_remote_change(&change(conn, BufferKind::Script, *v, false)))
            .collect();

        assert_eq!(
            verdicts,
            vec![
                RemoteChange::Apply,
                RemoteChange::Apply,
                RemoteChange::Stale,
                RemoteChange::Apply,
            ]
        );
    }

    #[test]
    fn equal_version_is_dropped_as_duplicate() {
        let mut sync = EditorSync::new();
        let conn = ConnectionId::generate();

        assert_eq!(
            sync.apply_remote_change(&change(conn, BufferKind::Style, 2, false)),
            RemoteChange::Apply
        );
        assert_eq!(
            sync.apply_remote_change(&change(conn, BufferKind::Style, 2, false)),
            RemoteChange::Stale
        );
    }

    #[test]
    fn version_streams_are_independent_per_connection_and_buffer() {
        let mut sync = EditorSync::new();
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();

        assert_eq!(
            sync.apply_remote_change(&change(a, BufferKind::Script, 5, false)),
            RemoteChange::Apply
        );
        // Same version from another connection is a separate stream.
        assert_eq!(
            sync.apply_remote_change(&change(b, BufferKind::Script, 5, false)),
            RemoteChange::Apply
        );
        // Same connection, different buffer: also separate.
        assert_eq!(
            sync.apply_remote_change(&change(a, BufferKind::Markup, 1, false)),
            RemoteChange::Apply
        );
    }

    #[test]
    fn acknowledgement_clears_pending_and_is_always_applied() {
        let mut sync = EditorSync::new();
        let conn = ConnectionId::generate();

        sync.record_local_change(BufferKind::Script, json!({"insert": "a"}));
        sync.record_local_change(BufferKind::Script, json!({"insert": "b"}));
        sync.record_local_change(BufferKind::Markup, json!({"insert": "c"}));
        sync.apply_remote_change(&change(conn, BufferKind::Script, 10, false));

        // A stale version would normally be dropped; the ack flag wins.
        let verdict = sync.apply_remote_change(&change(conn, BufferKind::Script, 3, true));

        assert_eq!(verdict, RemoteChange::Apply);
        assert_eq!(sync.pending_len(BufferKind::Script), 0);
        // Other buffers keep their pending logs.
        assert_eq!(sync.pending_len(BufferKind::Markup), 1);
        // The stale ack did not lower the version bar.
        assert_eq!(
            sync.apply_remote_change(&change(conn, BufferKind::Script, 10, false)),
            RemoteChange::Stale
        );
    }

    #[test]
    fn unchanged_selection_is_not_resent() {
        let mut sync = EditorSync::new();
        let sel = Selection { from: 3, to: 7 };

        assert!(sync.selection_changed(BufferKind::Script, sel));
        assert!(!sync.selection_changed(BufferKind::Script, sel));
        assert!(sync.selection_changed(BufferKind::Script, Selection { from: 3, to: 8 }));
        // Per-buffer tracking: same range in another buffer still sends.
        assert!(sync.selection_changed(BufferKind::Style, sel));
    }

    #[test]
    fn remove_user_clears_their_selections_only() {
        let mut sync = EditorSync::new();
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();

        let mut sel = EditorCursorPayload {
            group_id: RoomId::new("G1").unwrap(),
            buffer_kind: BufferKind::Script,
            connection_id: a,
            user_id: UserId::new("u1"),
            user_name: "Ada".to_string(),
            color: "#e6194b".to_string(),
            selection: Selection { from: 0, to: 0 },
            timestamp: 0,
            rest: Map::new(),
        };
        sync.apply_remote_selection(&sel);
        sel.connection_id = b;
        sel.user_id = UserId::new("u2");
        sync.apply_remote_selection(&sel);

        sync.remove_user(&UserId::new("u1"));

        assert_eq!(sync.remote_selections().len(), 1);
        assert!(
            sync.remote_selections()
                .contains_key(&(b, BufferKind::Script))
        );
    }
}
