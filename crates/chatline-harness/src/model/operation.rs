//! Chat operations driven through both the model and the network.
//!
//! Operations represent every contract call a user can make. They are
//! generated randomly by proptest (or decoded from fuzz input) and applied
//! to both the model and the real network.

use arbitrary::Arbitrary;

/// User identifier (0-indexed).
pub type UserId = u8;

/// Room identifier: index into rooms in creation order.
///
/// Indices past the last created room name a room that does not exist.
pub type ModelRoomId = u8;

/// Users a model can name.
pub const MODEL_USER_CAPACITY: usize = UserId::MAX as usize + 1;

/// Rooms a model can name.
pub const MODEL_ROOM_CAPACITY: usize = ModelRoomId::MAX as usize + 1;

/// A single chat call, or a clock step, made by a model user.
#[derive(Debug, Clone, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// User creates a room.
    CreateRoom {
        /// Acting user.
        user: UserId,
        /// Requested name (may be empty or contain NUL).
        name: String,
    },

    /// Owner deletes a room.
    DeleteRoom {
        /// Acting user.
        user: UserId,
        /// Target room.
        room: ModelRoomId,
    },

    /// Owner restores a deleted room.
    RestoreRoom {
        /// Acting user.
        user: UserId,
        /// Target room.
        room: ModelRoomId,
    },

    /// Owner invites another user.
    InviteToRoom {
        /// Acting user.
        user: UserId,
        /// Target room.
        room: ModelRoomId,
        /// User to invite.
        invitee: UserId,
    },

    /// Owner removes a member.
    RemoveFromRoom {
        /// Acting user.
        user: UserId,
        /// Target room.
        room: ModelRoomId,
        /// Member to remove.
        member: UserId,
    },

    /// Owner promotes a member.
    PromoteToOwner {
        /// Acting user.
        user: UserId,
        /// Target room.
        room: ModelRoomId,
        /// Member to promote.
        member: UserId,
    },

    /// Owner demotes an owner.
    DemoteOwner {
        /// Acting user.
        user: UserId,
        /// Target room.
        room: ModelRoomId,
        /// Owner to demote.
        owner: UserId,
    },

    /// Member sends a message.
    SendMessage {
        /// Acting user.
        user: UserId,
        /// Target room.
        room: ModelRoomId,
        /// Message content.
        content: MessageContent,
    },

    /// Member reads a room's messages.
    GetMessages {
        /// Acting user.
        user: UserId,
        /// Target room.
        room: ModelRoomId,
    },

    /// User lists their rooms.
    GetRooms {
        /// Acting user.
        user: UserId,
    },

    /// Move the virtual clock forward.
    ///
    /// The model ignores time; the real network stamps later messages.
    AdvanceTime {
        /// Milliseconds to add to the clock.
        millis: u16,
    },
}

impl Operation {
    /// Map every user id into `0..num_users`.
    #[must_use]
    pub fn clamp_users(self, num_users: usize) -> Self {
        let n = num_users.clamp(1, usize::from(u8::MAX)) as u8;
        let c = |id: UserId| id % n;
        match self {
            Self::CreateRoom { user, name } => Self::CreateRoom { user: c(user), name },
            Self::DeleteRoom { user, room } => Self::DeleteRoom { user: c(user), room },
            Self::RestoreRoom { user, room } => Self::RestoreRoom { user: c(user), room },
            Self::InviteToRoom { user, room, invitee } => {
                Self::InviteToRoom { user: c(user), room, invitee: c(invitee) }
            },
            Self::RemoveFromRoom { user, room, member } => {
                Self::RemoveFromRoom { user: c(user), room, member: c(member) }
            },
            Self::PromoteToOwner { user, room, member } => {
                Self::PromoteToOwner { user: c(user), room, member: c(member) }
            },
            Self::DemoteOwner { user, room, owner } => {
                Self::DemoteOwner { user: c(user), room, owner: c(owner) }
            },
            Self::SendMessage { user, room, content } => {
                Self::SendMessage { user: c(user), room, content }
            },
            Self::GetMessages { user, room } => Self::GetMessages { user: c(user), room },
            Self::GetRooms { user } => Self::GetRooms { user: c(user) },
            Self::AdvanceTime { millis } => Self::AdvanceTime { millis },
        }
    }

    /// Acting user, if the operation has one.
    pub fn user(&self) -> Option<UserId> {
        match self {
            Self::CreateRoom { user, .. }
            | Self::DeleteRoom { user, .. }
            | Self::RestoreRoom { user, .. }
            | Self::InviteToRoom { user, .. }
            | Self::RemoveFromRoom { user, .. }
            | Self::PromoteToOwner { user, .. }
            | Self::DemoteOwner { user, .. }
            | Self::SendMessage { user, .. }
            | Self::GetMessages { user, .. }
            | Self::GetRooms { user } => Some(*user),
            Self::AdvanceTime { .. } => None,
        }
    }
}

/// Body of a `SendMessage` operation.
#[derive(Debug, Clone, PartialEq, Eq, Arbitrary)]
pub enum MessageContent {
    /// Generated content.
    Small(SmallMessage),
    /// Exact text.
    Text(String),
}

impl MessageContent {
    /// Expand to text, given the contract's character limit.
    pub fn to_text(&self, max_chars: usize) -> String {
        match self {
            Self::Small(message) => message.to_text(max_chars),
            Self::Text(text) => text.clone(),
        }
    }
}

impl From<SmallMessage> for MessageContent {
    fn from(message: SmallMessage) -> Self {
        Self::Small(message)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Compact message content for testing.
///
/// Expanded deterministically so test cases stay small while still
/// reaching the empty, multi-byte and over-limit cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub struct SmallMessage {
    /// Content seed.
    pub seed: u8,
    /// Size class (0-3 maps to empty/short/wide/over the limit).
    pub size_class: u8,
}

impl SmallMessage {
    /// Expand to text, given the contract's character limit.
    pub fn to_text(self, max_chars: usize) -> String {
        match self.size_class % 4 {
            0 => String::new(),
            1 => (0..8u8).map(|i| char::from(b'a' + self.seed.wrapping_add(i) % 26)).collect(),
            // Two bytes per char: exercises character counting
            2 => "é".repeat(usize::from(self.seed % 32) + 1),
            _ => "x".repeat(max_chars + 1),
        }
    }
}

/// Outcome of one operation, comparable across model and network.
///
/// Queries carry their data so reads are compared too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Mutation succeeded.
    Ok,

    /// `remove_from_room` refused without changing state.
    Rejected,

    /// `get_messages` result.
    Messages(Vec<ModelMessage>),

    /// `get_rooms` result, in creation order.
    Rooms(Vec<ModelRoomId>),

    /// The contract rejected the call.
    Error(OperationError),
}

impl OperationResult {
    /// Whether the operation went through.
    pub fn is_ok(&self) -> bool {
        !self.is_err()
    }

    /// Whether the operation was refused.
    pub fn is_err(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// A message as the model stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMessage {
    /// Sending user.
    pub sender: UserId,
    /// Message body.
    pub body: String,
}

/// Contract rule violations, one per rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationError {
    /// Room name contains NUL.
    InvalidRoomName,
    /// Room does not exist.
    RoomNotFound,
    /// Room is deleted.
    RoomDeleted,
    /// Restore of a live room.
    RoomNotDeleted,
    /// Caller is not a member.
    NotMember,
    /// Caller is not an owner.
    NotOwner,
    /// Invitee already a member.
    AlreadyMember,
    /// Target is not a member.
    TargetNotMember,
    /// Promotee already an owner.
    AlreadyOwner,
    /// Demotee is not an owner.
    TargetNotOwner,
    /// Demotion of the last owner.
    LastOwner,
    /// Member limit reached.
    RoomFull,
    /// Message over the character limit.
    MessageTooLong,
    /// Message limit reached.
    MessageLimitReached,
    /// Every `ModelRoomId` is taken. The contract has no such rule.
    OutOfRoomIds,
}
