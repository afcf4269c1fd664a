//! Model world: users, rooms and delivered events.
//!
//! The world is the oracle against which the real network is verified. Rules
//! are checked in the same order the contract checks them, each written out
//! in full per operation.

use std::collections::BTreeSet;

use chatline_core::ChatLimits;

use super::operation::{
    ModelMessage, ModelRoomId, Operation, OperationError, OperationResult, UserId,
};

/// Room state in the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRoom {
    /// Room name.
    pub name: String,
    /// Creating user.
    pub creator: UserId,
    /// Owners.
    pub owners: BTreeSet<UserId>,
    /// Members (owners included).
    pub members: BTreeSet<UserId>,
    /// Deletion flag.
    pub deleted: bool,
    /// Messages in send order.
    pub messages: Vec<ModelMessage>,
}

/// State both the model and the network can report.
///
/// This is the subset of world state that can be compared against the real
/// network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Every room, in creation order.
    pub rooms: Vec<ModelRoom>,
    /// Number of events delivered to each user.
    pub user_events: Vec<usize>,
}

/// Users, rooms and per-user event counts as the rules dictate.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    limits: ChatLimits,
    rooms: Vec<ModelRoom>,
    /// Events delivered per user.
    user_events: Vec<usize>,
}

impl ModelWorld {
    /// Create a world with `num_users` users and default limits.
    pub fn new(num_users: usize) -> Self {
        Self::with_limits(num_users, ChatLimits::default())
    }

    /// Create a world with `num_users` users and the given limits.
    pub fn with_limits(num_users: usize, limits: ChatLimits) -> Self {
        Self { limits, rooms: Vec::new(), user_events: vec![0; num_users] }
    }

    /// Add a user and return its id, or `None` once every `UserId` is taken.
    pub fn add_user(&mut self) -> Option<UserId> {
        let id = UserId::try_from(self.user_events.len()).ok()?;
        self.user_events.push(0);
        Some(id)
    }

    /// Number of users.
    pub fn num_users(&self) -> usize {
        self.user_events.len()
    }

    /// Limits the model enforces.
    pub fn limits(&self) -> ChatLimits {
        self.limits
    }

    /// Get a room by id.
    pub fn room(&self, room: ModelRoomId) -> Option<&ModelRoom> {
        self.rooms.get(room as usize)
    }

    /// Number of rooms created.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Apply `op` to the model.
    ///
    /// Events for successful mutations are counted for their recipients.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        let result = match op {
            Operation::CreateRoom { user, name } => self.create_room(*user, name),
            Operation::DeleteRoom { user, room } => self.delete_room(*user, *room),
            Operation::RestoreRoom { user, room } => self.restore_room(*user, *room),
            Operation::InviteToRoom { user, room, invitee } => {
                self.invite_to_room(*user, *room, *invitee)
            },
            Operation::RemoveFromRoom { user, room, member } => {
                return self.remove_from_room(*user, *room, *member);
            },
            Operation::PromoteToOwner { user, room, member } => {
                self.promote_to_owner(*user, *room, *member)
            },
            Operation::DemoteOwner { user, room, owner } => self.demote_owner(*user, *room, *owner),
            Operation::SendMessage { user, room, content } => {
                let body = content.to_text(self.limits.max_message_chars);
                self.send_message(*user, *room, body)
            },
            Operation::GetMessages { user, room } => return self.get_messages(*user, *room),
            Operation::GetRooms { user } => return self.get_rooms(*user),
            Operation::AdvanceTime { .. } => return OperationResult::Ok,
        };

        match result {
            Ok(room) => {
                self.deliver(room, &[]);
                OperationResult::Ok
            },
            Err(e) => OperationResult::Error(e),
        }
    }

    /// Rooms and event counts, for comparison with the network.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState { rooms: self.rooms.clone(), user_events: self.user_events.clone() }
    }

    fn create_room(&mut self, user: UserId, name: &str) -> Result<ModelRoomId, OperationError> {
        if name.contains('\0') {
            return Err(OperationError::InvalidRoomName);
        }
        let id =
            ModelRoomId::try_from(self.rooms.len()).map_err(|_| OperationError::OutOfRoomIds)?;
        self.rooms.push(ModelRoom {
            name: name.to_string(),
            creator: user,
            owners: BTreeSet::from([user]),
            members: BTreeSet::from([user]),
            deleted: false,
            messages: Vec::new(),
        });
        Ok(id)
    }

    fn delete_room(
        &mut self,
        user: UserId,
        id: ModelRoomId,
    ) -> Result<ModelRoomId, OperationError> {
        let room = self.rooms.get_mut(id as usize).ok_or(OperationError::RoomNotFound)?;
        if room.deleted {
            return Err(OperationError::RoomDeleted);
        }
        if !room.members.contains(&user) {
            return Err(OperationError::NotMember);
        }
        if !room.owners.contains(&user) {
            return Err(OperationError::NotOwner);
        }
        room.deleted = true;
        Ok(id)
    }

    fn restore_room(
        &mut self,
        user: UserId,
        id: ModelRoomId,
    ) -> Result<ModelRoomId, OperationError> {
        let room = self.rooms.get_mut(id as usize).ok_or(OperationError::RoomNotFound)?;
        if !room.deleted {
            return Err(OperationError::RoomNotDeleted);
        }
        if !room.members.contains(&user) {
            return Err(OperationError::NotMember);
        }
        if !room.owners.contains(&user) {
            return Err(OperationError::NotOwner);
        }
        room.deleted = false;
        Ok(id)
    }

    fn invite_to_room(
        &mut self,
        user: UserId,
        id: ModelRoomId,
        invitee: UserId,
    ) -> Result<ModelRoomId, OperationError> {
        let max_members = self.limits.max_members_per_room;
        let room = self.rooms.get_mut(id as usize).ok_or(OperationError::RoomNotFound)?;
        if room.deleted {
            return Err(OperationError::RoomDeleted);
        }
        if !room.members.contains(&user) {
            return Err(OperationError::NotMember);
        }
        if !room.owners.contains(&user) {
            return Err(OperationError::NotOwner);
        }
        if room.members.contains(&invitee) {
            return Err(OperationError::AlreadyMember);
        }
        if room.members.len() >= max_members {
            return Err(OperationError::RoomFull);
        }
        room.members.insert(invitee);
        Ok(id)
    }

    fn remove_from_room(
        &mut self,
        user: UserId,
        id: ModelRoomId,
        member: UserId,
    ) -> OperationResult {
        let Some(room) = self.rooms.get_mut(id as usize) else {
            return OperationResult::Error(OperationError::RoomNotFound);
        };
        if user == member {
            return OperationResult::Rejected;
        }
        if room.deleted {
            return OperationResult::Error(OperationError::RoomDeleted);
        }
        if !room.members.contains(&user) {
            return OperationResult::Error(OperationError::NotMember);
        }
        if !room.owners.contains(&user) {
            return OperationResult::Error(OperationError::NotOwner);
        }
        if !room.members.contains(&member) {
            return OperationResult::Error(OperationError::TargetNotMember);
        }
        room.members.remove(&member);
        room.owners.remove(&member);
        self.deliver(id, &[member]);
        OperationResult::Ok
    }

    fn promote_to_owner(
        &mut self,
        user: UserId,
        id: ModelRoomId,
        member: UserId,
    ) -> Result<ModelRoomId, OperationError> {
        let room = self.rooms.get_mut(id as usize).ok_or(OperationError::RoomNotFound)?;
        if room.deleted {
            return Err(OperationError::RoomDeleted);
        }
        if !room.members.contains(&user) {
            return Err(OperationError::NotMember);
        }
        if !room.owners.contains(&user) {
            return Err(OperationError::NotOwner);
        }
        if !room.members.contains(&member) {
            return Err(OperationError::TargetNotMember);
        }
        if room.owners.contains(&member) {
            return Err(OperationError::AlreadyOwner);
        }
        room.owners.insert(member);
        Ok(id)
    }

    fn demote_owner(
        &mut self,
        user: UserId,
        id: ModelRoomId,
        owner: UserId,
    ) -> Result<ModelRoomId, OperationError> {
        let room = self.rooms.get_mut(id as usize).ok_or(OperationError::RoomNotFound)?;
        if room.deleted {
            return Err(OperationError::RoomDeleted);
        }
        if !room.members.contains(&user) {
            return Err(OperationError::NotMember);
        }
        if !room.owners.contains(&user) {
            return Err(OperationError::NotOwner);
        }
        if !room.owners.contains(&owner) {
            return Err(OperationError::TargetNotOwner);
        }
        if room.owners.len() == 1 {
            return Err(OperationError::LastOwner);
        }
        room.owners.remove(&owner);
        Ok(id)
    }

    fn send_message(
        &mut self,
        user: UserId,
        id: ModelRoomId,
        body: String,
    ) -> Result<ModelRoomId, OperationError> {
        let limits = self.limits;
        let room = self.rooms.get_mut(id as usize).ok_or(OperationError::RoomNotFound)?;
        if room.deleted {
            return Err(OperationError::RoomDeleted);
        }
        if !room.members.contains(&user) {
            return Err(OperationError::NotMember);
        }
        if body.chars().count() > limits.max_message_chars {
            return Err(OperationError::MessageTooLong);
        }
        if room.messages.len() >= limits.max_messages_per_room {
            return Err(OperationError::MessageLimitReached);
        }
        room.messages.push(ModelMessage { sender: user, body });
        Ok(id)
    }

    fn get_messages(&self, user: UserId, id: ModelRoomId) -> OperationResult {
        let Some(room) = self.rooms.get(id as usize) else {
            return OperationResult::Error(OperationError::RoomNotFound);
        };
        if room.deleted {
            return OperationResult::Error(OperationError::RoomDeleted);
        }
        if !room.members.contains(&user) {
            return OperationResult::Error(OperationError::NotMember);
        }
        OperationResult::Messages(room.messages.clone())
    }

    fn get_rooms(&self, user: UserId) -> OperationResult {
        let rooms = self
            .rooms
            .iter()
            .enumerate()
            .filter(|(_, room)| room.members.contains(&user))
            .filter_map(|(id, _)| ModelRoomId::try_from(id).ok())
            .collect();
        OperationResult::Rooms(rooms)
    }

    /// Count one event for every member of `room` plus `extra` users.
    fn deliver(&mut self, room: ModelRoomId, extra: &[UserId]) {
        let Some(room) = self.rooms.get(room as usize) else {
            return;
        };
        for user in room.members.iter().chain(extra) {
            if let Some(count) = self.user_events.get_mut(*user as usize) {
                *count += 1;
            }
        }
    }
}
