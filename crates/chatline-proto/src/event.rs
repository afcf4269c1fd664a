//! Versioned contract events.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ContractRef, KeyAlias, Message, RoomSnapshot};

/// Kind of state change an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A room was created.
    CreateRoom,
    /// A room was deleted.
    DeleteRoom,
    /// A deleted room was restored.
    RestoreRoom,
    /// A participant was invited.
    InviteToRoom,
    /// A member was removed.
    RemoveFromRoom,
    /// A message was sent.
    SendMessage,
    /// A member was promoted to owner.
    PromoteToOwner,
    /// An owner was demoted.
    DemoteOwner,
}

impl EventKind {
    /// Event name as it appears in the event type.
    pub fn name(self) -> &'static str {
        match self {
            Self::CreateRoom => "CreateRoomEvent",
            Self::DeleteRoom => "DeleteRoomEvent",
            Self::RestoreRoom => "RestoreRoomEvent",
            Self::InviteToRoom => "InviteToRoomEvent",
            Self::RemoveFromRoom => "RemoveFromRoomEvent",
            Self::SendMessage => "SendMessageEvent",
            Self::PromoteToOwner => "PromoteToOwnerEvent",
            Self::DemoteOwner => "DemoteOwnerEvent",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Payload carried by every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventData {
    /// Room state after the change.
    pub room: RoomSnapshot,
    /// Participant the change targeted (invitee, removee, promotee, demotee).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub member: Option<KeyAlias>,
    /// Message appended by a `SendMessage` event.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<Message>,
}

/// An event emitted by a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomEvent {
    /// Contract that emitted the event.
    pub contract: ContractRef,
    /// What happened.
    pub kind: EventKind,
    /// Event payload.
    pub data: EventData,
}

impl RoomEvent {
    /// Fully-qualified type, e.g. `chat/10-1.0.0/CreateRoomEvent`.
    pub fn event_type(&self) -> String {
        format!("{}/{}", self.contract, self.kind)
    }

    /// Whether this event has the given type and concerns a room named
    /// `room_name`.
    pub fn matches(&self, event_type: &str, room_name: &str) -> bool {
        self.event_type() == event_type && self.data.room.name == room_name
    }
}
