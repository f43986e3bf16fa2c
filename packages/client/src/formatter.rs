//! Event formatting for the demo CLI.

use atelier_shared::protocol::{RoomMember, ServerFrame};
use atelier_shared::time::millis_to_rfc3339;

/// Format the current-users snapshot shown right after joining.
pub fn format_snapshot(users: &[RoomMember]) -> String {
    let mut output = String::new();
    output.push_str("\n---- room members ----\n");
    if users.is_empty() {
        output.push_str("(nobody else is here)\n");
    } else {
        for member in users {
            output.push_str(&format!(
                "{} <{}> [{}]\n",
                member.user_name, member.user_email, member.color
            ));
        }
    }
    output.push_str("----------------------\n");
    output
}

/// One line per inbound frame.
pub fn format_frame(frame: &ServerFrame) -> String {
    match frame {
        ServerFrame::CurrentUsers { users, .. } => format_snapshot(users),
        ServerFrame::UserJoined { user_name, .. } => format!("+ {user_name} joined\n"),
        ServerFrame::UserLeft { user_name, .. } => format!("- {user_name} left\n"),
        ServerFrame::CanvasCursor(p) => format!(
            "~ {} moved canvas cursor to ({:.0}, {:.0}) at {}\n",
            p.user_name,
            p.x,
            p.y,
            millis_to_rfc3339(p.timestamp)
        ),
        ServerFrame::EditorCursor(p) => format!(
            "~ {} selected {}..{} in {}\n",
            p.user_name, p.selection.from, p.selection.to, p.buffer_kind
        ),
        ServerFrame::EditorChange(p) => {
            if p.is_acknowledgement {
                format!("* ack for {} (v{})\n", p.buffer_kind, p.version)
            } else {
                format!("* {} edited {} (v{})\n", p.user_id, p.buffer_kind, p.version)
            }
        }
        ServerFrame::Error { message } => format!("! relay error: {message}\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_shared::types::{ConnectionId, UserId};

    #[test]
    fn empty_snapshot_says_so() {
        let rendered = format_snapshot(&[]);
        assert!(rendered.contains("nobody else is here"));
    }

    #[test]
    fn join_and_leave_lines_name_the_user() {
        let joined = ServerFrame::UserJoined {
            connection_id: ConnectionId::generate(),
            user_id: UserId::new("u1"),
            user_email: "u1@example.com".to_string(),
            user_name: "Ada".to_string(),
            user_image: String::new(),
        };
        assert_eq!(format_frame(&joined), "+ Ada joined\n");

        let left = ServerFrame::UserLeft {
            user_id: UserId::new("u1"),
            user_email: "u1@example.com".to_string(),
            user_name: "Ada".to_string(),
        };
        assert_eq!(format_frame(&left), "- Ada left\n");
    }
}
