//! Per-room resource limits.

use chatline_proto::{MESSAGE_ENCODING_OVERHEAD, RESPONSE_ENCODING_OVERHEAD};

/// Message length limit in Unicode scalar values (the same limit Slack uses).
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 4000;

/// Messages a single room can hold.
pub const DEFAULT_MAX_MESSAGES_PER_ROOM: usize = 2500;

/// Members (owners included) a single room can hold.
pub const DEFAULT_MAX_MEMBERS_PER_ROOM: usize = 10;

/// Limits enforced by every published chat contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatLimits {
    /// Longest accepted message body, in characters.
    pub max_message_chars: usize,
    /// Messages a room accepts before `send_message` fails.
    pub max_messages_per_room: usize,
    /// Members a room accepts before `invite_to_room` fails.
    pub max_members_per_room: usize,
}

impl Default for ChatLimits {
    fn default() -> Self {
        Self {
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
            max_messages_per_room: DEFAULT_MAX_MESSAGES_PER_ROOM,
            max_members_per_room: DEFAULT_MAX_MEMBERS_PER_ROOM,
        }
    }
}

impl ChatLimits {
    /// Largest encoded `get_messages` reply a room can produce: every
    /// message at the character limit, every character four bytes wide.
    ///
    /// Saturates at `usize::MAX`.
    pub fn worst_case_history_bytes(&self) -> usize {
        self.max_message_chars
            .saturating_mul(4)
            .saturating_add(MESSAGE_ENCODING_OVERHEAD)
            .saturating_mul(self.max_messages_per_room)
            .saturating_add(RESPONSE_ENCODING_OVERHEAD)
    }
}

#[cfg(test)]
mod tests {
    use chatline_proto::MAX_FRAME_SIZE;

    use super::*;

    #[test]
    fn default_history_fits_one_frame() {
        let worst = ChatLimits::default().worst_case_history_bytes();

        assert!(worst > 4 * DEFAULT_MAX_MESSAGE_CHARS * DEFAULT_MAX_MESSAGES_PER_ROOM);
        assert!(worst <= MAX_FRAME_SIZE, "{worst} > {MAX_FRAME_SIZE}");
    }

    #[test]
    fn worst_case_saturates() {
        let limits = ChatLimits { max_message_chars: usize::MAX, ..ChatLimits::default() };
        assert_eq!(limits.worst_case_history_bytes(), usize::MAX);
    }
}
