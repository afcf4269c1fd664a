//! Contract calls and their replies.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{KeyAlias, Message, RoomChannel, RoomEvent, RoomSnapshot};

/// Reason returned when a member tries to remove themselves.
pub const SELF_REMOVAL_REASON: &str = "Cannot remove self from room";

/// A call into the chat contract, made on behalf of a key alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatCall {
    /// Create a room owned by the caller.
    CreateRoom {
        /// Display name.
        room_name: String,
    },
    /// Delete a room.
    DeleteRoom {
        /// Target room.
        room_channel: RoomChannel,
    },
    /// Restore a deleted room.
    RestoreRoom {
        /// Target room.
        room_channel: RoomChannel,
    },
    /// Invite a participant.
    InviteToRoom {
        /// Target room.
        room_channel: RoomChannel,
        /// Participant to add.
        new_member: KeyAlias,
    },
    /// Remove a member.
    RemoveFromRoom {
        /// Target room.
        room_channel: RoomChannel,
        /// Member to remove.
        member_to_remove: KeyAlias,
    },
    /// Promote a member to owner.
    PromoteToOwner {
        /// Target room.
        room_channel: RoomChannel,
        /// Member to promote.
        member: KeyAlias,
    },
    /// Demote an owner to plain member.
    DemoteOwner {
        /// Target room.
        room_channel: RoomChannel,
        /// Owner to demote.
        owner: KeyAlias,
    },
    /// Append a message.
    SendMessage {
        /// Target room.
        room_channel: RoomChannel,
        /// Message body.
        message: String,
    },
    /// Read all messages of a room.
    GetMessages {
        /// Target room.
        room_channel: RoomChannel,
    },
    /// List the caller's rooms.
    GetRooms,
}

impl ChatCall {
    /// Contract function name, used in error messages.
    pub fn function(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "create_room",
            Self::DeleteRoom { .. } => "delete_room",
            Self::RestoreRoom { .. } => "restore_room",
            Self::InviteToRoom { .. } => "invite_to_room",
            Self::RemoveFromRoom { .. } => "remove_from_room",
            Self::PromoteToOwner { .. } => "promote_to_owner",
            Self::DemoteOwner { .. } => "demote_owner",
            Self::SendMessage { .. } => "send_message",
            Self::GetMessages { .. } => "get_messages",
            Self::GetRooms => "get_rooms",
        }
    }

    /// Whether the call changes contract state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::GetMessages { .. } | Self::GetRooms)
    }
}

/// Outcome of `remove_from_room`.
///
/// Self-removal is a returned rejection, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoveOutcome {
    /// Member was removed.
    Removed(RoomEvent),
    /// Removal was refused.
    Rejected {
        /// Human-readable reason.
        reason: String,
    },
}

impl RemoveOutcome {
    /// The emitted event, if the member was removed.
    pub fn event(&self) -> Option<&RoomEvent> {
        match self {
            Self::Removed(event) => Some(event),
            Self::Rejected { .. } => None,
        }
    }
}

impl fmt::Display for RemoveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Removed(event) => {
                let member = event.data.member.as_ref().map_or("<unknown>", KeyAlias::as_str);
                write!(f, "removed {member} from room {}", event.data.room.channel)
            },
            Self::Rejected { reason } => f.write_str(reason),
        }
    }
}

/// Successful result of a contract call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallReply {
    /// A mutation emitted this event.
    Event(RoomEvent),
    /// Result of `remove_from_room`.
    Removal(RemoveOutcome),
    /// Result of `get_messages`.
    Messages(Vec<Message>),
    /// Result of `get_rooms`.
    Rooms(Vec<RoomSnapshot>),
}

impl CallReply {
    /// The emitted event, if any.
    pub fn event(&self) -> Option<&RoomEvent> {
        match self {
            Self::Event(event) => Some(event),
            Self::Removal(outcome) => outcome.event(),
            Self::Messages(_) | Self::Rooms(_) => None,
        }
    }
}
