//! Typed contract handle bound to one participant.

use chatline_proto::{
    CallReply, ChatCall, ContractRef, KeyAlias, Message, RemoveOutcome, RoomChannel, RoomEvent,
    RoomSnapshot,
};

use crate::{NetworkError, env::Environment, network::Network};

/// Calls one contract version as one key alias.
///
/// Obtained from [`Network::chat`]. Each method signs and executes a single
/// [`ChatCall`].
pub struct ChatClient<'a, E: Environment> {
    network: &'a mut Network<E>,
    contract: ContractRef,
    key_alias: KeyAlias,
}

impl<'a, E: Environment> ChatClient<'a, E> {
    pub(crate) fn new(
        network: &'a mut Network<E>,
        contract: ContractRef,
        key_alias: KeyAlias,
    ) -> Self {
        Self { network, contract, key_alias }
    }

    /// Alias this handle acts as.
    pub fn key_alias(&self) -> &KeyAlias {
        &self.key_alias
    }

    /// Contract this handle calls.
    pub fn contract(&self) -> &ContractRef {
        &self.contract
    }

    /// Create a room. The returned event carries the new channel.
    pub fn create_room(&mut self, room_name: &str) -> Result<RoomEvent, NetworkError> {
        self.call_event(ChatCall::CreateRoom { room_name: room_name.to_owned() })
    }

    /// Delete a room.
    pub fn delete_room(&mut self, room_channel: &RoomChannel) -> Result<RoomEvent, NetworkError> {
        self.call_event(ChatCall::DeleteRoom { room_channel: room_channel.clone() })
    }

    /// Restore a deleted room.
    pub fn restore_room(&mut self, room_channel: &RoomChannel) -> Result<RoomEvent, NetworkError> {
        self.call_event(ChatCall::RestoreRoom { room_channel: room_channel.clone() })
    }

    /// Invite a participant.
    pub fn invite_to_room(
        &mut self,
        room_channel: &RoomChannel,
        new_member: &KeyAlias,
    ) -> Result<RoomEvent, NetworkError> {
        self.call_event(ChatCall::InviteToRoom {
            room_channel: room_channel.clone(),
            new_member: new_member.clone(),
        })
    }

    /// Remove a member. Self-removal comes back as `RemoveOutcome::Rejected`.
    pub fn remove_from_room(
        &mut self,
        room_channel: &RoomChannel,
        member_to_remove: &KeyAlias,
    ) -> Result<RemoveOutcome, NetworkError> {
        let call = ChatCall::RemoveFromRoom {
            room_channel: room_channel.clone(),
            member_to_remove: member_to_remove.clone(),
        };
        let function = call.function();
        match self.call(call)? {
            CallReply::Removal(outcome) => Ok(outcome),
            _ => Err(NetworkError::UnexpectedReply { function }),
        }
    }

    /// Promote a member to owner.
    pub fn promote_to_owner(
        &mut self,
        room_channel: &RoomChannel,
        member: &KeyAlias,
    ) -> Result<RoomEvent, NetworkError> {
        self.call_event(ChatCall::PromoteToOwner {
            room_channel: room_channel.clone(),
            member: member.clone(),
        })
    }

    /// Demote an owner.
    pub fn demote_owner(
        &mut self,
        room_channel: &RoomChannel,
        owner: &KeyAlias,
    ) -> Result<RoomEvent, NetworkError> {
        self.call_event(ChatCall::DemoteOwner {
            room_channel: room_channel.clone(),
            owner: owner.clone(),
        })
    }

    /// Send a message.
    pub fn send_message(
        &mut self,
        room_channel: &RoomChannel,
        message: &str,
    ) -> Result<RoomEvent, NetworkError> {
        self.call_event(ChatCall::SendMessage {
            room_channel: room_channel.clone(),
            message: message.to_owned(),
        })
    }

    /// Read a room's messages.
    pub fn get_messages(
        &mut self,
        room_channel: &RoomChannel,
    ) -> Result<Vec<Message>, NetworkError> {
        let call = ChatCall::GetMessages { room_channel: room_channel.clone() };
        let function = call.function();
        match self.call(call)? {
            CallReply::Messages(messages) => Ok(messages),
            _ => Err(NetworkError::UnexpectedReply { function }),
        }
    }

    /// List rooms this alias belongs to.
    pub fn get_rooms(&mut self) -> Result<Vec<RoomSnapshot>, NetworkError> {
        match self.call(ChatCall::GetRooms)? {
            CallReply::Rooms(rooms) => Ok(rooms),
            _ => Err(NetworkError::UnexpectedReply { function: "get_rooms" }),
        }
    }

    fn call(&mut self, call: ChatCall) -> Result<CallReply, NetworkError> {
        self.network.call(&self.key_alias, &self.contract, call)
    }

    fn call_event(&mut self, call: ChatCall) -> Result<RoomEvent, NetworkError> {
        let function = call.function();
        match self.call(call)? {
            CallReply::Event(event) => Ok(event),
            _ => Err(NetworkError::UnexpectedReply { function }),
        }
    }
}
