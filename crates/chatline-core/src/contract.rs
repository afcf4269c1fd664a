//! Chat contract state machine.
//!
//! One `ChatContract` exists per published contract version. It owns every
//! room created through that version and enforces the permission rules.
//!
//! ## Rule order
//!
//! Every operation checks, in order, and fails on the first violation:
//!
//! 1. Room exists
//! 2. Operation-specific argument checks (room name, self-removal)
//! 3. Deletion state (live, or deleted for `restore_room`)
//! 4. Caller is a member
//! 5. Caller is an owner (delete, restore, invite, remove, promote, demote)
//! 6. Target membership/ownership
//! 7. Limits
//!
//! ## Design
//!
//! - Action-based: mutations return an [`Emission`] naming the event and its
//!   recipients; fan-out is the network's job
//! - No I/O: time and randomness come from the caller's `Environment`

use std::collections::HashMap;

use chatline_proto::{
    CallReply, ChatCall, ContractRef, EventData, EventKind, KeyAlias, Message, RemoveOutcome,
    RoomChannel, RoomEvent, RoomSnapshot, SELF_REMOVAL_REASON,
};

use crate::{
    ChatError, ChatLimits,
    env::{Environment, MAX_ID_DRAWS, draw_unused},
    room::Room,
};

/// An event together with the participants it must be delivered to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    /// The emitted event.
    pub event: RoomEvent,
    /// Room members after the change, plus a removed member if any.
    pub recipients: Vec<KeyAlias>,
}

/// Result of `remove_from_room`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    /// Member removed; deliver the emission.
    Removed(Emission),
    /// Removal refused without changing state.
    Rejected {
        /// Human-readable reason.
        reason: String,
    },
}

/// Result of executing a [`ChatCall`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Reply for the caller.
    pub reply: CallReply,
    /// Participants that receive `reply`'s event. Empty for queries.
    pub recipients: Vec<KeyAlias>,
}

impl From<Emission> for Execution {
    fn from(emission: Emission) -> Self {
        Self { reply: CallReply::Event(emission.event), recipients: emission.recipients }
    }
}

/// Room/membership/message state machine for one contract version.
#[derive(Debug, Clone)]
pub struct ChatContract {
    contract: ContractRef,
    limits: ChatLimits,
    rooms: HashMap<RoomChannel, Room>,
    /// Channels in creation order.
    order: Vec<RoomChannel>,
}

impl ChatContract {
    /// Create an empty contract instance.
    pub fn new(contract: ContractRef, limits: ChatLimits) -> Self {
        Self { contract, limits, rooms: HashMap::new(), order: Vec::new() }
    }

    /// Contract this instance implements.
    pub fn contract_ref(&self) -> &ContractRef {
        &self.contract
    }

    /// Limits enforced by this instance.
    pub fn limits(&self) -> ChatLimits {
        self.limits
    }

    /// Number of rooms ever created (deleted rooms included).
    pub fn room_count(&self) -> usize {
        self.order.len()
    }

    /// Snapshot of a room, bypassing permission checks.
    pub fn room(&self, channel: &RoomChannel) -> Option<RoomSnapshot> {
        self.rooms.get(channel).map(Room::snapshot)
    }

    /// Snapshots of every room in creation order, bypassing permission
    /// checks.
    pub fn rooms(&self) -> impl Iterator<Item = RoomSnapshot> + '_ {
        self.order.iter().filter_map(|channel| self.room(channel))
    }

    /// Messages of a room, bypassing permission checks.
    pub fn messages(&self, channel: &RoomChannel) -> Option<&[Message]> {
        self.rooms.get(channel).map(|room| room.messages.as_slice())
    }

    /// Execute a call on behalf of `caller`.
    pub fn execute<E: Environment>(
        &mut self,
        caller: &KeyAlias,
        call: ChatCall,
        env: &E,
    ) -> Result<Execution, ChatError> {
        match call {
            ChatCall::CreateRoom { room_name } => {
                self.create_room(caller, &room_name, env).map(Execution::from)
            },
            ChatCall::DeleteRoom { room_channel } => {
                self.delete_room(caller, &room_channel).map(Execution::from)
            },
            ChatCall::RestoreRoom { room_channel } => {
                self.restore_room(caller, &room_channel).map(Execution::from)
            },
            ChatCall::InviteToRoom { room_channel, new_member } => {
                self.invite_to_room(caller, &room_channel, &new_member).map(Execution::from)
            },
            ChatCall::RemoveFromRoom { room_channel, member_to_remove } => {
                match self.remove_from_room(caller, &room_channel, &member_to_remove)? {
                    Removal::Removed(emission) => Ok(Execution {
                        reply: CallReply::Removal(RemoveOutcome::Removed(emission.event)),
                        recipients: emission.recipients,
                    }),
                    Removal::Rejected { reason } => Ok(Execution {
                        reply: CallReply::Removal(RemoveOutcome::Rejected { reason }),
                        recipients: Vec::new(),
                    }),
                }
            },
            ChatCall::PromoteToOwner { room_channel, member } => {
                self.promote_to_owner(caller, &room_channel, &member).map(Execution::from)
            },
            ChatCall::DemoteOwner { room_channel, owner } => {
                self.demote_owner(caller, &room_channel, &owner).map(Execution::from)
            },
            ChatCall::SendMessage { room_channel, message } => {
                self.send_message(caller, &room_channel, message, env).map(Execution::from)
            },
            ChatCall::GetMessages { room_channel } => Ok(Execution {
                reply: CallReply::Messages(self.get_messages(caller, &room_channel)?),
                recipients: Vec::new(),
            }),
            ChatCall::GetRooms => {
                let reply = CallReply::Rooms(self.get_rooms(caller));
                Ok(Execution { reply, recipients: Vec::new() })
            },
        }
    }

    /// Create a room owned by `creator`.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::InvalidRoomName` if the name contains NUL. Empty
    /// names are accepted. `ChatError::NoFreeChannel` if the environment
    /// keeps drawing channels already in use.
    pub fn create_room<E: Environment>(
        &mut self,
        creator: &KeyAlias,
        room_name: &str,
        env: &E,
    ) -> Result<Emission, ChatError> {
        if room_name.contains('\0') {
            return Err(ChatError::InvalidRoomName);
        }

        let channel = draw_unused(
            || RoomChannel::from_u128(env.random_u128()),
            |candidate| self.rooms.contains_key(candidate),
        )
        .ok_or(ChatError::NoFreeChannel { draws: MAX_ID_DRAWS })?;

        let room = Room::new(channel.clone(), room_name.to_owned(), creator.clone());
        let emission = emit(&self.contract, EventKind::CreateRoom, &room, None, None);
        self.rooms.insert(channel.clone(), room);
        self.order.push(channel.clone());

        tracing::debug!(contract = %self.contract, %channel, %creator, "room created");
        Ok(emission)
    }

    /// Mark a room deleted. Its state is kept for `restore_room`.
    pub fn delete_room(
        &mut self,
        deleter: &KeyAlias,
        channel: &RoomChannel,
    ) -> Result<Emission, ChatError> {
        let room = live_room_mut(&mut self.rooms, channel)?;
        require_owner(room, deleter)?;

        room.deleted = true;

        tracing::debug!(contract = %self.contract, %channel, %deleter, "room deleted");
        Ok(emit(&self.contract, EventKind::DeleteRoom, room, None, None))
    }

    /// Bring a deleted room back with its members and messages.
    pub fn restore_room(
        &mut self,
        restorer: &KeyAlias,
        channel: &RoomChannel,
    ) -> Result<Emission, ChatError> {
        let room = room_mut(&mut self.rooms, channel)?;
        if !room.deleted {
            return Err(ChatError::RoomNotDeleted(channel.clone()));
        }
        require_owner(room, restorer)?;

        room.deleted = false;

        tracing::debug!(contract = %self.contract, %channel, %restorer, "room restored");
        Ok(emit(&self.contract, EventKind::RestoreRoom, room, None, None))
    }

    /// Add `invitee` as a plain member.
    pub fn invite_to_room(
        &mut self,
        inviter: &KeyAlias,
        channel: &RoomChannel,
        invitee: &KeyAlias,
    ) -> Result<Emission, ChatError> {
        let limit = self.limits.max_members_per_room;
        let room = live_room_mut(&mut self.rooms, channel)?;
        require_owner(room, inviter)?;

        if room.is_member(invitee) {
            return Err(ChatError::AlreadyMember(invitee.clone()));
        }
        if room.members.len() >= limit {
            return Err(ChatError::RoomFull { limit });
        }

        room.members.insert(invitee.clone());

        tracing::debug!(contract = %self.contract, %channel, %inviter, %invitee, "member invited");
        Ok(emit(&self.contract, EventKind::InviteToRoom, room, Some(invitee), None))
    }

    /// Remove `removee` (and their ownership, if any).
    ///
    /// Self-removal is returned as [`Removal::Rejected`] rather than an
    /// error.
    pub fn remove_from_room(
        &mut self,
        remover: &KeyAlias,
        channel: &RoomChannel,
        removee: &KeyAlias,
    ) -> Result<Removal, ChatError> {
        let room = room_mut(&mut self.rooms, channel)?;
        if remover == removee {
            tracing::debug!(contract = %self.contract, %channel, %remover, "self-removal rejected");
            return Ok(Removal::Rejected { reason: SELF_REMOVAL_REASON.to_owned() });
        }
        if room.deleted {
            return Err(ChatError::RoomDeleted(channel.clone()));
        }
        require_owner(room, remover)?;
        if !room.is_member(removee) {
            return Err(ChatError::TargetNotMember(removee.clone()));
        }

        room.members.remove(removee);
        room.owners.remove(removee);

        tracing::debug!(contract = %self.contract, %channel, %remover, %removee, "member removed");
        let mut emission =
            emit(&self.contract, EventKind::RemoveFromRoom, room, Some(removee), None);
        emission.recipients.push(removee.clone());
        Ok(Removal::Removed(emission))
    }

    /// Grant ownership to an existing member.
    pub fn promote_to_owner(
        &mut self,
        promoter: &KeyAlias,
        channel: &RoomChannel,
        promotee: &KeyAlias,
    ) -> Result<Emission, ChatError> {
        let room = live_room_mut(&mut self.rooms, channel)?;
        require_owner(room, promoter)?;

        if !room.is_member(promotee) {
            return Err(ChatError::TargetNotMember(promotee.clone()));
        }
        if room.is_owner(promotee) {
            return Err(ChatError::AlreadyOwner(promotee.clone()));
        }

        room.owners.insert(promotee.clone());

        tracing::debug!(
            contract = %self.contract,
            %channel,
            %promoter,
            %promotee,
            "owner promoted"
        );
        Ok(emit(&self.contract, EventKind::PromoteToOwner, room, Some(promotee), None))
    }

    /// Revoke ownership. The last owner cannot be demoted.
    pub fn demote_owner(
        &mut self,
        demoter: &KeyAlias,
        channel: &RoomChannel,
        demotee: &KeyAlias,
    ) -> Result<Emission, ChatError> {
        let room = live_room_mut(&mut self.rooms, channel)?;
        require_owner(room, demoter)?;

        if !room.is_owner(demotee) {
            return Err(ChatError::TargetNotOwner(demotee.clone()));
        }
        if room.owners.len() == 1 {
            return Err(ChatError::LastOwner);
        }

        room.owners.remove(demotee);

        tracing::debug!(contract = %self.contract, %channel, %demoter, %demotee, "owner demoted");
        Ok(emit(&self.contract, EventKind::DemoteOwner, room, Some(demotee), None))
    }

    /// Append a message to a room the sender belongs to.
    pub fn send_message<E: Environment>(
        &mut self,
        sender: &KeyAlias,
        channel: &RoomChannel,
        body: String,
        env: &E,
    ) -> Result<Emission, ChatError> {
        let limits = self.limits;
        let room = live_room_mut(&mut self.rooms, channel)?;
        require_member(room, sender)?;

        let len = body.chars().count();
        if len > limits.max_message_chars {
            return Err(ChatError::MessageTooLong { len, max: limits.max_message_chars });
        }
        if room.messages.len() >= limits.max_messages_per_room {
            return Err(ChatError::MessageLimitReached { limit: limits.max_messages_per_room });
        }

        let message = room.append(sender.clone(), body, env.now_millis()).clone();

        tracing::trace!(
            contract = %self.contract,
            %channel,
            %sender,
            index = message.index,
            "message sent"
        );
        Ok(emit(&self.contract, EventKind::SendMessage, room, None, Some(message)))
    }

    /// All messages of a live room, oldest first.
    pub fn get_messages(
        &self,
        getter: &KeyAlias,
        channel: &RoomChannel,
    ) -> Result<Vec<Message>, ChatError> {
        let room = self.rooms.get(channel).ok_or_else(|| ChatError::RoomNotFound(channel.clone()))?;
        if room.deleted {
            return Err(ChatError::RoomDeleted(channel.clone()));
        }
        require_member(room, getter)?;

        Ok(room.messages.clone())
    }

    /// Rooms `getter` belongs to, deleted ones included, in creation order.
    pub fn get_rooms(&self, getter: &KeyAlias) -> Vec<RoomSnapshot> {
        self.order
            .iter()
            .filter_map(|channel| self.rooms.get(channel))
            .filter(|room| room.is_member(getter))
            .map(Room::snapshot)
            .collect()
    }
}

fn room_mut<'a>(
    rooms: &'a mut HashMap<RoomChannel, Room>,
    channel: &RoomChannel,
) -> Result<&'a mut Room, ChatError> {
    rooms.get_mut(channel).ok_or_else(|| ChatError::RoomNotFound(channel.clone()))
}

fn live_room_mut<'a>(
    rooms: &'a mut HashMap<RoomChannel, Room>,
    channel: &RoomChannel,
) -> Result<&'a mut Room, ChatError> {
    let room = room_mut(rooms, channel)?;
    if room.deleted {
        return Err(ChatError::RoomDeleted(channel.clone()));
    }
    Ok(room)
}

fn require_member(room: &Room, alias: &KeyAlias) -> Result<(), ChatError> {
    if room.is_member(alias) { Ok(()) } else { Err(ChatError::NotMember(alias.clone())) }
}

fn require_owner(room: &Room, alias: &KeyAlias) -> Result<(), ChatError> {
    require_member(room, alias)?;
    if room.is_owner(alias) { Ok(()) } else { Err(ChatError::NotOwner(alias.clone())) }
}

fn emit(
    contract: &ContractRef,
    kind: EventKind,
    room: &Room,
    member: Option<&KeyAlias>,
    message: Option<Message>,
) -> Emission {
    let snapshot = room.snapshot();
    let recipients = snapshot.members.clone();
    let event = RoomEvent {
        contract: contract.clone(),
        kind,
        data: EventData { room: snapshot, member: member.cloned(), message },
    };
    Emission { event, recipients }
}
