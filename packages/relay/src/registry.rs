//! In-memory room registry.
//!
//! Rooms exist implicitly: created on first join, removed deterministically
//! when the last member leaves. The registry is the single owner of room
//! state; callers reach it only through [`AppState`](crate::state::AppState)'s
//! mutex, which serializes all mutation.

use std::collections::HashMap;
use std::sync::Arc;

use atelier_shared::protocol::{RoomMember, SelfInfo, ServerFrame};
use atelier_shared::types::{ConnectionId, RoomId, UserIdentity, color_for_index};

use crate::sink::EventSink;

/// One live connection inside a room.
pub struct Member {
    pub identity: UserIdentity,
    pub color: &'static str,
    sink: Arc<dyn EventSink>,
}

struct Room {
    members: HashMap<ConnectionId, Member>,
    /// Total connections ever admitted, used to cycle the color palette so
    /// rejoining members don't collide with current ones.
    admitted: usize,
}

impl Room {
    fn new() -> Self {
        Self {
            members: HashMap::new(),
            admitted: 0,
        }
    }
}

/// Registry of all rooms in this relay process. Holds no durable state.
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    /// Admit a connection into a room.
    ///
    /// Every call creates a fresh connection, even for a user already in
    /// the room: multiple tabs are independent connections. Unicasts the
    /// `current-users` snapshot to the joiner and broadcasts `user-joined`
    /// to everyone else.
    pub async fn join(
        &mut self,
        room_id: &RoomId,
        identity: UserIdentity,
        sink: Arc<dyn EventSink>,
    ) -> ConnectionId {
        let room = self.rooms.entry(room_id.clone()).or_insert_with(Room::new);

        let connection_id = ConnectionId::generate();
        let color = color_for_index(room.admitted);
        room.admitted += 1;

        // Snapshot of everyone already present, before the joiner is added.
        let roster: Vec<RoomMember> = room
            .members
            .iter()
            .map(|(id, member)| RoomMember {
                connection_id: *id,
                user_id: member.identity.user_id.clone(),
                user_email: member.identity.user_email.clone(),
                user_name: member.identity.user_name.clone(),
                user_image: member.identity.user_image.clone(),
                color: member.color.to_string(),
            })
            .collect();

        let joined = encode(&ServerFrame::UserJoined {
            connection_id,
            user_id: identity.user_id.clone(),
            user_email: identity.user_email.clone(),
            user_name: identity.user_name.clone(),
            user_image: identity.user_image.clone(),
        });
        broadcast(room, None, &joined).await;

        let snapshot = encode(&ServerFrame::CurrentUsers {
            you: SelfInfo {
                connection_id,
                color: color.to_string(),
            },
            users: roster,
        });
        if sink.push(snapshot).await.is_err() {
            tracing::warn!(%connection_id, room = %room_id, "failed to send current-users snapshot");
        }

        room.members.insert(
            connection_id,
            Member {
                identity,
                color,
                sink,
            },
        );

        tracing::info!(
            %connection_id,
            room = %room_id,
            members = room.members.len(),
            "connection joined room"
        );

        connection_id
    }

    /// Remove a connection wherever it is registered.
    ///
    /// A connection belongs to at most one room, but the scan is defensive:
    /// transport-level disconnects arrive without a room id. Broadcasts
    /// `user-left` (user identity, not connection id) to the remaining
    /// members and drops the room at zero members.
    pub async fn leave(&mut self, connection_id: ConnectionId) {
        let mut emptied: Vec<RoomId> = Vec::new();

        for (room_id, room) in self.rooms.iter_mut() {
            let Some(member) = room.members.remove(&connection_id) else {
                continue;
            };

            tracing::info!(
                %connection_id,
                room = %room_id,
                members = room.members.len(),
                "connection left room"
            );

            if room.members.is_empty() {
                emptied.push(room_id.clone());
            } else {
                let left = encode(&ServerFrame::UserLeft {
                    user_id: member.identity.user_id.clone(),
                    user_email: member.identity.user_email.clone(),
                    user_name: member.identity.user_name.clone(),
                });
                broadcast(room, None, &left).await;
            }
        }

        for room_id in emptied {
            self.rooms.remove(&room_id);
            tracing::info!(room = %room_id, "room emptied and removed");
        }
    }

    /// Forward a raw frame to every member of `room_id` except the sender.
    ///
    /// The envelope was validated once on ingress; the payload itself is
    /// forwarded verbatim so fields this build does not know about pass
    /// through untouched.
    pub async fn relay(&self, sender: ConnectionId, room_id: &RoomId, raw: &str) {
        let Some(room) = self.rooms.get(room_id) else {
            tracing::warn!(%sender, room = %room_id, "relay to unknown room dropped");
            return;
        };
        broadcast(room, Some(sender), raw).await;
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn member_count(&self, room_id: &RoomId) -> Option<usize> {
        self.rooms.get(room_id).map(|room| room.members.len())
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Deliver a frame to every member of the room except `exclude`.
///
/// A failed delivery is logged and skipped; one dead peer must not affect
/// fan-out to the rest.
async fn broadcast(room: &Room, exclude: Option<ConnectionId>, frame: &str) {
    for (id, member) in room.members.iter() {
        if Some(*id) == exclude {
            continue;
        }
        if member.sink.push(frame.to_string()).await.is_err() {
            tracing::warn!(connection_id = %id, "failed to deliver frame to member");
        }
    }
}

fn encode(frame: &ServerFrame) -> String {
    serde_json::to_string(frame).expect("server frames serialize to JSON")
}
