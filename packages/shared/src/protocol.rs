//! Wire protocol for the relay channel.
//!
//! Every WebSocket frame is one JSON object tagged by `type`. The join
//! handshake itself is not a frame; it travels as query parameters on the
//! upgrade request. Relayed payloads carry a flattened catch-all map so
//! fields this build does not know about pass through the relay and the
//! decoder untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{BufferKind, ConnectionId, RoomId, UserId};

/// A selection range inside one editor buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub from: u64,
    pub to: u64,
}

/// Pointer position on the shared visual canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasCursorPayload {
    pub group_id: RoomId,
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub user_name: String,
    pub color: String,
    pub x: f64,
    pub y: f64,
    pub timestamp: i64,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Caret/selection position inside one editor buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorCursorPayload {
    pub group_id: RoomId,
    pub buffer_kind: BufferKind,
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub user_name: String,
    pub color: String,
    pub selection: Selection,
    pub timestamp: i64,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// A content change in one editor buffer.
///
/// `changes` is opaque to the relay; only the receiving editor interprets
/// it. `version` is per (originating connection, buffer) and strictly
/// increasing; receivers drop anything not newer than what they last
/// accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorChangePayload {
    pub group_id: RoomId,
    pub buffer_kind: BufferKind,
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub version: u64,
    pub changes: Value,
    #[serde(default)]
    pub is_acknowledgement: bool,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// One remote connection as listed in the `current-users` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMember {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub user_email: String,
    pub user_name: String,
    pub user_image: String,
    pub color: String,
}

/// What the relay assigned to the joining connection itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfInfo {
    pub connection_id: ConnectionId,
    pub color: String,
}

/// Frames a client sends to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientFrame {
    /// Explicit leave without closing the socket.
    #[serde(rename_all = "camelCase")]
    LeaveGame { group_id: RoomId },
    CanvasCursor(CanvasCursorPayload),
    EditorCursor(EditorCursorPayload),
    EditorChange(EditorChangePayload),
}

impl ClientFrame {
    /// Room the frame addresses, used by the relay for routing.
    pub fn room_id(&self) -> &RoomId {
        match self {
            ClientFrame::LeaveGame { group_id } => group_id,
            ClientFrame::CanvasCursor(p) => &p.group_id,
            ClientFrame::EditorCursor(p) => &p.group_id,
            ClientFrame::EditorChange(p) => &p.group_id,
        }
    }

    /// Tag string, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientFrame::LeaveGame { .. } => "leave-game",
            ClientFrame::CanvasCursor(_) => "canvas-cursor",
            ClientFrame::EditorCursor(_) => "editor-cursor",
            ClientFrame::EditorChange(_) => "editor-change",
        }
    }
}

/// Frames the relay sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerFrame {
    /// Unicast to a joiner: everyone already present, plus the joiner's
    /// own assigned connection id and color.
    CurrentUsers {
        you: SelfInfo,
        users: Vec<RoomMember>,
    },
    #[serde(rename_all = "camelCase")]
    UserJoined {
        connection_id: ConnectionId,
        user_id: UserId,
        user_email: String,
        user_name: String,
        user_image: String,
    },
    /// Carries user identity, not a connection id: receivers decide
    /// themselves whether the user still has other live tabs.
    #[serde(rename_all = "camelCase")]
    UserLeft {
        user_id: UserId,
        user_email: String,
        user_name: String,
    },
    CanvasCursor(CanvasCursorPayload),
    EditorCursor(EditorCursorPayload),
    EditorChange(EditorChangePayload),
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cursor_payload() -> CanvasCursorPayload {
        CanvasCursorPayload {
            group_id: RoomId::new("G1").unwrap(),
            connection_id: ConnectionId::generate(),
            user_id: UserId::new("u1"),
            user_name: "Ada".to_string(),
            color: "#e6194b".to_string(),
            x: 10.0,
            y: 20.0,
            timestamp: 1_700_000_000_000,
            rest: Map::new(),
        }
    }

    #[test]
    fn frames_carry_kebab_case_tags() {
        let frame = ClientFrame::CanvasCursor(cursor_payload());
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "canvas-cursor");
        assert_eq!(value["groupId"], "G1");
        assert_eq!(value["x"], 10.0);
    }

    #[test]
    fn client_and_server_cursor_frames_share_the_wire_shape() {
        // The relay forwards client frames verbatim; receivers decode the
        // same bytes as a server frame.
        let text = serde_json::to_string(&ClientFrame::CanvasCursor(cursor_payload())).unwrap();
        let decoded: ServerFrame = serde_json::from_str(&text).unwrap();
        match decoded {
            ServerFrame::CanvasCursor(p) => {
                assert_eq!(p.x, 10.0);
                assert_eq!(p.y, 20.0);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let raw = json!({
            "type": "canvas-cursor",
            "groupId": "G1",
            "connectionId": "b9c7cbb5-6f8a-4a39-9f6e-0d8f6d3f2a11",
            "userId": "u1",
            "userName": "Ada",
            "color": "#e6194b",
            "x": 1.0,
            "y": 2.0,
            "timestamp": 0,
            "pressure": 0.7
        });
        let frame: ClientFrame = serde_json::from_value(raw).unwrap();
        let ClientFrame::CanvasCursor(payload) = &frame else {
            panic!("wrong variant");
        };
        assert_eq!(payload.rest["pressure"], 0.7);

        let out = serde_json::to_value(&frame).unwrap();
        assert_eq!(out["pressure"], 0.7);
    }

    #[test]
    fn acknowledgement_flag_defaults_to_false() {
        let raw = json!({
            "type": "editor-change",
            "groupId": "G1",
            "bufferKind": "script",
            "connectionId": "b9c7cbb5-6f8a-4a39-9f6e-0d8f6d3f2a11",
            "userId": "u1",
            "version": 3,
            "changes": {"insert": "x"}
        });
        let frame: ClientFrame = serde_json::from_value(raw).unwrap();
        let ClientFrame::EditorChange(payload) = frame else {
            panic!("wrong variant");
        };
        assert!(!payload.is_acknowledgement);
        assert_eq!(payload.version, 3);
    }

    #[test]
    fn leave_game_routes_by_group_id() {
        let frame = ClientFrame::LeaveGame {
            group_id: RoomId::new("G9").unwrap(),
        };
        assert_eq!(frame.room_id().as_str(), "G9");
        assert_eq!(frame.kind(), "leave-game");
    }

    #[test]
    fn current_users_lists_roster_and_self() {
        let me = ConnectionId::generate();
        let frame = ServerFrame::CurrentUsers {
            you: SelfInfo {
                connection_id: me,
                color: "#3cb44b".to_string(),
            },
            users: vec![],
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "current-users");
        assert_eq!(value["you"]["color"], "#3cb44b");
        assert!(value["users"].as_array().unwrap().is_empty());
    }
}
