//! Presence: the deduplicated-by-user view of who is in the room.
//!
//! Connections arrive and leave per tab; presence counts live connections
//! per user id and shows one `ActiveUser` regardless of how many tabs the
//! user has open. Typing indicators expire locally, the wire carries no
//! "stopped typing" signal.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use atelier_shared::protocol::{RoomMember, ServerFrame};
use atelier_shared::types::{BufferKind, UserId};

/// A typing indicator not refreshed within this window goes dark.
pub const TYPING_TIMEOUT: Duration = Duration::from_secs(3);

/// One remote user currently present in the room.
#[derive(Debug, Clone)]
pub struct ActiveUser {
    pub user_id: UserId,
    pub user_email: String,
    pub user_name: String,
    pub user_image: String,
    /// Color of the user's first seen connection; joins observed only via
    /// `user-joined` have no color until a cursor event carries one.
    pub color: Option<String>,
    /// Which editor buffer the user is focused on, if known.
    pub focused_buffer: Option<BufferKind>,
    /// Live connections (tabs) for this user.
    connections: usize,
    typing_until: Option<Instant>,
}

impl ActiveUser {
    pub fn is_typing(&self, now: Instant) -> bool {
        self.typing_until.is_some_and(|until| now < until)
    }

    pub fn connection_count(&self) -> usize {
        self.connections
    }
}

/// What a presence update meant, so callers can react (e.g. clear cursor
/// state when a user fully leaves).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceChange {
    /// First connection for this user id appeared.
    Joined(UserId),
    /// Last connection for this user id went away.
    Left(UserId),
}

/// Tracks remote users in the current room.
pub struct PresenceTracker {
    users: HashMap<UserId, ActiveUser>,
    typing_timeout: Duration,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::with_typing_timeout(TYPING_TIMEOUT)
    }

    pub fn with_typing_timeout(typing_timeout: Duration) -> Self {
        Self {
            users: HashMap::new(),
            typing_timeout,
        }
    }

    /// Fold a relay frame into the presence view. Frames that don't carry
    /// membership information are ignored.
    pub fn apply(&mut self, frame: &ServerFrame) -> Option<PresenceChange> {
        match frame {
            ServerFrame::CurrentUsers { users, .. } => {
                for member in users {
                    self.add_connection(member);
                }
                None
            }
            ServerFrame::UserJoined {
                user_id,
                user_email,
                user_name,
                user_image,
                ..
            } => {
                let entry = self.users.entry(user_id.clone()).or_insert_with(|| ActiveUser {
                    user_id: user_id.clone(),
                    user_email: user_email.clone(),
                    user_name: user_name.clone(),
                    user_image: user_image.clone(),
                    color: None,
                    focused_buffer: None,
                    connections: 0,
                    typing_until: None,
                });
                entry.connections += 1;
                (entry.connections == 1).then(|| PresenceChange::Joined(user_id.clone()))
            }
            ServerFrame::UserLeft { user_id, .. } => {
                let user = self.users.get_mut(user_id)?;
                user.connections = user.connections.saturating_sub(1);
                if user.connections == 0 {
                    self.users.remove(user_id);
                    Some(PresenceChange::Left(user_id.clone()))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn add_connection(&mut self, member: &RoomMember) {
        let entry = self
            .users
            .entry(member.user_id.clone())
            .or_insert_with(|| ActiveUser {
                user_id: member.user_id.clone(),
                user_email: member.user_email.clone(),
                user_name: member.user_name.clone(),
                user_image: member.user_image.clone(),
                color: Some(member.color.clone()),
                focused_buffer: None,
                connections: 0,
                typing_until: None,
            });
        entry.connections += 1;
        if entry.color.is_none() {
            entry.color = Some(member.color.clone());
        }
    }

    /// Note that a user was seen editing a buffer: moves their focus and
    /// refreshes the typing indicator.
    pub fn observe_edit(&mut self, user_id: &UserId, buffer: BufferKind, now: Instant) {
        if let Some(user) = self.users.get_mut(user_id) {
            if user.focused_buffer != Some(buffer) {
                // Focus switch clears the indicator before restarting it.
                user.typing_until = None;
            }
            user.focused_buffer = Some(buffer);
            user.typing_until = Some(now + self.typing_timeout);
        }
    }

    /// Move a user's focus without marking them as typing.
    pub fn set_focus(&mut self, user_id: &UserId, buffer: Option<BufferKind>) {
        if let Some(user) = self.users.get_mut(user_id) {
            if user.focused_buffer != buffer {
                user.typing_until = None;
            }
            user.focused_buffer = buffer;
        }
    }

    pub fn get(&self, user_id: &UserId) -> Option<&ActiveUser> {
        self.users.get(user_id)
    }

    pub fn users(&self) -> impl Iterator<Item = &ActiveUser> {
        self.users.values()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Users currently focused on the given buffer.
    pub fn users_in_buffer(&self, buffer: BufferKind) -> Vec<&ActiveUser> {
        self.users
            .values()
            .filter(|user| user.focused_buffer == Some(buffer))
            .collect()
    }

    /// Forget everyone; used on terminal connection failure.
    pub fn clear(&mut self) {
        self.users.clear();
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}
