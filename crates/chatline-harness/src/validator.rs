//! Oracle validator: one operation stream, two implementations.
//!
//! `ChatValidator` applies every operation to the [`ModelWorld`] and to a real
//! [`Network`] running on [`SimEnv`], then checks that:
//!
//! - both return the same result
//! - a successful mutation delivered its event to the acting user
//! - at teardown, room state and per-user event counts agree and the global
//!   invariants hold
//!
//! It also offers one helper per contract function so regression tests read
//! as plain call sequences. Helpers return the real network's error when both
//! sides agree the call fails.

use std::collections::BTreeSet;

use chatline_core::{
    ChatError, ChatLimits, Network, NetworkError,
    proto::{
        CallReply, ChatCall, ContractRef, KeyAlias, Message, RemoveOutcome, RoomChannel,
        RoomEvent, RoomSnapshot,
    },
};
use thiserror::Error;

use crate::{
    SimEnv,
    model::{
        MODEL_ROOM_CAPACITY, MODEL_USER_CAPACITY, MessageContent, ModelMessage, ModelRoom,
        ModelRoomId, ModelWorld, ObservableState, Operation, OperationError, OperationResult,
        UserId,
    },
};

/// Validation failures.
#[derive(Debug, Error)]
pub enum ValidatorError {
    /// The call failed on both sides, or failed outside the contract.
    #[error(transparent)]
    Call(#[from] NetworkError),

    /// Model and network disagreed on an operation's result.
    #[error("divergence on {operation:?}\nmodel: {model:?}\nreal:  {real:?}")]
    Divergence {
        /// Operation that diverged.
        operation: Operation,
        /// Model result.
        model: OperationResult,
        /// Network result.
        real: OperationResult,
    },

    /// Model and network state disagree.
    #[error("state divergence: {0}")]
    StateDivergence(String),

    /// A global invariant does not hold.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// Operation names a user that does not exist.
    #[error("unknown user {0}")]
    UnknownUser(UserId),

    /// The model cannot give another user or room an id.
    #[error("model {kind} ids exhausted (capacity {capacity})")]
    OutOfIds {
        /// `"user"` or `"room"`.
        kind: &'static str,
        /// Ids available for `kind`.
        capacity: usize,
    },
}

/// Validator configuration.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Users registered up front.
    pub num_users: usize,
    /// Seed for `SimEnv`.
    pub seed: u64,
    /// Contract version under test.
    pub contract: ContractRef,
    /// Limits for both sides.
    pub limits: ChatLimits,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            num_users: 2,
            seed: 0,
            contract: ContractRef::chat_10(),
            limits: ChatLimits::default(),
        }
    }
}

/// What the network did with a call.
enum Real {
    Reply(CallReply),
    Failed(NetworkError),
    Idle,
}

/// Runs operations against the model and the network in lockstep.
pub struct ChatValidator {
    model: ModelWorld,
    network: Network<SimEnv>,
    contract: ContractRef,
    users: Vec<KeyAlias>,
    /// Real channel of each model room.
    channels: Vec<RoomChannel>,
}

impl ChatValidator {
    /// Validator for `chat 1.0.0 @ 10` with `num_users` users.
    pub fn new(num_users: usize, seed: u64) -> Result<Self, ValidatorError> {
        Self::with_config(ValidatorConfig { num_users, seed, ..ValidatorConfig::default() })
    }

    /// Validator for `contract` with `num_users` users.
    pub fn for_contract(
        contract: ContractRef,
        num_users: usize,
        seed: u64,
    ) -> Result<Self, ValidatorError> {
        let config = ValidatorConfig { num_users, seed, contract, ..ValidatorConfig::default() };
        Self::with_config(config)
    }

    /// Validator from a full configuration.
    ///
    /// The network is upgraded to protocol 10 with both chat versions
    /// published.
    pub fn with_config(config: ValidatorConfig) -> Result<Self, ValidatorError> {
        if config.num_users > MODEL_USER_CAPACITY {
            return Err(ValidatorError::OutOfIds { kind: "user", capacity: MODEL_USER_CAPACITY });
        }

        let mut network = Network::with_limits(SimEnv::with_seed(config.seed), config.limits);
        network.upgrade_protocol(ContractRef::chat_10().language)?;
        network.publish(&[ContractRef::chat_9(), ContractRef::chat_10()])?;

        let users = (0..config.num_users)
            .map(|_| network.register_key_alias())
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(seed = config.seed, contract = %config.contract, "validator started");

        Ok(Self {
            model: ModelWorld::with_limits(config.num_users, config.limits),
            network,
            contract: config.contract,
            users,
            channels: Vec::new(),
        })
    }

    /// The real network.
    pub fn network(&self) -> &Network<SimEnv> {
        &self.network
    }

    /// The model.
    pub fn model(&self) -> &ModelWorld {
        &self.model
    }

    /// Contract under test.
    pub fn contract(&self) -> &ContractRef {
        &self.contract
    }

    /// Number of users.
    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    /// Register another user on both sides.
    pub fn add_user(&mut self) -> Result<UserId, ValidatorError> {
        let out_of_ids = ValidatorError::OutOfIds { kind: "user", capacity: MODEL_USER_CAPACITY };
        if self.users.len() >= MODEL_USER_CAPACITY {
            return Err(out_of_ids);
        }
        let alias = self.network.register_key_alias()?;
        let user = self.model.add_user().ok_or(out_of_ids)?;
        self.users.push(alias);
        Ok(user)
    }

    /// Key alias of `user`.
    pub fn key_alias(&self, user: UserId) -> Result<&KeyAlias, ValidatorError> {
        self.users.get(usize::from(user)).ok_or(ValidatorError::UnknownUser(user))
    }

    /// Real channel of `room`, if it has been created.
    pub fn channel(&self, room: ModelRoomId) -> Option<&RoomChannel> {
        self.channels.get(usize::from(room))
    }

    /// Events delivered to `user`, oldest first.
    pub fn events(&self, user: UserId) -> Result<&[RoomEvent], ValidatorError> {
        Ok(self.network.events(self.key_alias(user)?))
    }

    /// Apply one operation to both sides and compare.
    ///
    /// A contract rejection that both sides agree on is a normal result, not
    /// an error.
    pub fn apply(&mut self, op: &Operation) -> Result<OperationResult, ValidatorError> {
        self.run(op).map(|(result, _)| result)
    }

    /// Compare full state and check global invariants.
    pub fn teardown(&self) -> Result<(), ValidatorError> {
        let expected = self.model.observable_state();
        let actual = self.observable_state()?;

        if expected.user_events != actual.user_events {
            return Err(ValidatorError::StateDivergence(format!(
                "event counts: model {:?}, real {:?}",
                expected.user_events, actual.user_events
            )));
        }
        if expected.rooms.len() != actual.rooms.len() {
            return Err(ValidatorError::StateDivergence(format!(
                "room count: model {}, real {}",
                expected.rooms.len(),
                actual.rooms.len()
            )));
        }
        for (id, (model, real)) in expected.rooms.iter().zip(&actual.rooms).enumerate() {
            if model != real {
                return Err(ValidatorError::StateDivergence(format!(
                    "room {id}: model {model:?}, real {real:?}"
                )));
            }
        }

        self.check_invariants()
    }

    /// Create a room and return its model id.
    pub fn create_room(&mut self, user: UserId, name: &str) -> Result<ModelRoomId, ValidatorError> {
        let event = self.event(Operation::CreateRoom { user, name: name.to_string() })?;
        self.room_id(&event.data.room.channel)
    }

    /// Delete a room.
    pub fn delete_room(
        &mut self,
        user: UserId,
        room: ModelRoomId,
    ) -> Result<RoomEvent, ValidatorError> {
        self.event(Operation::DeleteRoom { user, room })
    }

    /// Restore a deleted room.
    pub fn restore_room(
        &mut self,
        user: UserId,
        room: ModelRoomId,
    ) -> Result<RoomEvent, ValidatorError> {
        self.event(Operation::RestoreRoom { user, room })
    }

    /// Invite `invitee`.
    pub fn invite_to_room(
        &mut self,
        user: UserId,
        room: ModelRoomId,
        invitee: UserId,
    ) -> Result<RoomEvent, ValidatorError> {
        self.event(Operation::InviteToRoom { user, room, invitee })
    }

    /// Remove `member`. Self-removal yields `RemoveOutcome::Rejected`.
    pub fn remove_from_room(
        &mut self,
        user: UserId,
        room: ModelRoomId,
        member: UserId,
    ) -> Result<RemoveOutcome, ValidatorError> {
        match self.reply(Operation::RemoveFromRoom { user, room, member })? {
            CallReply::Removal(outcome) => Ok(outcome),
            _ => Err(NetworkError::UnexpectedReply { function: "remove_from_room" }.into()),
        }
    }

    /// Promote `member` to owner.
    pub fn promote_to_owner(
        &mut self,
        user: UserId,
        room: ModelRoomId,
        member: UserId,
    ) -> Result<RoomEvent, ValidatorError> {
        self.event(Operation::PromoteToOwner { user, room, member })
    }

    /// Demote `owner`.
    pub fn demote_owner(
        &mut self,
        user: UserId,
        room: ModelRoomId,
        owner: UserId,
    ) -> Result<RoomEvent, ValidatorError> {
        self.event(Operation::DemoteOwner { user, room, owner })
    }

    /// Send `message` verbatim.
    pub fn send_message(
        &mut self,
        user: UserId,
        room: ModelRoomId,
        message: &str,
    ) -> Result<RoomEvent, ValidatorError> {
        self.event(Operation::SendMessage { user, room, content: MessageContent::from(message) })
    }

    /// Read a room's messages.
    pub fn get_messages(
        &mut self,
        user: UserId,
        room: ModelRoomId,
    ) -> Result<Vec<Message>, ValidatorError> {
        match self.reply(Operation::GetMessages { user, room })? {
            CallReply::Messages(messages) => Ok(messages),
            _ => Err(NetworkError::UnexpectedReply { function: "get_messages" }.into()),
        }
    }

    /// List `user`'s rooms.
    pub fn get_rooms(&mut self, user: UserId) -> Result<Vec<RoomSnapshot>, ValidatorError> {
        match self.reply(Operation::GetRooms { user })? {
            CallReply::Rooms(rooms) => Ok(rooms),
            _ => Err(NetworkError::UnexpectedReply { function: "get_rooms" }.into()),
        }
    }

    fn event(&mut self, op: Operation) -> Result<RoomEvent, ValidatorError> {
        let function = op_function(&op);
        let reply = self.reply(op)?;
        reply.event().cloned().ok_or_else(|| NetworkError::UnexpectedReply { function }.into())
    }

    fn reply(&mut self, op: Operation) -> Result<CallReply, ValidatorError> {
        match self.run(&op)? {
            (_, Real::Reply(reply)) => Ok(reply),
            (_, Real::Failed(e)) => Err(e.into()),
            (_, Real::Idle) => {
                Err(NetworkError::UnexpectedReply { function: op_function(&op) }.into())
            },
        }
    }

    fn run(&mut self, op: &Operation) -> Result<(OperationResult, Real), ValidatorError> {
        let Some(user) = op.user() else {
            if let Operation::AdvanceTime { millis } = op {
                self.network.env().advance(u64::from(*millis));
            }
            return Ok((self.model.apply(op), Real::Idle));
        };

        let creates_room = matches!(op, Operation::CreateRoom { .. });
        if creates_room && self.channels.len() >= MODEL_ROOM_CAPACITY {
            return Err(ValidatorError::OutOfIds { kind: "room", capacity: MODEL_ROOM_CAPACITY });
        }

        let alias = self.key_alias(user)?.clone();
        let call = self.to_call(op)?;
        let (real, reply) = match self.network.call(&alias, &self.contract, call) {
            Ok(reply) => (self.observe(op, &reply)?, Ok(reply)),
            Err(e) => match e.chat_error().and_then(operation_error) {
                Some(error) => (OperationResult::Error(error), Err(e)),
                None => return Err(e.into()),
            },
        };
        let model = self.model.apply(op);

        if model != real {
            tracing::warn!(?op, ?model, ?real, "model divergence");
            return Err(ValidatorError::Divergence { operation: op.clone(), model, real });
        }

        match reply {
            Ok(reply) => {
                if let Some(event) = reply.event() {
                    self.check_delivered(&alias, event)?;
                }
                Ok((real, Real::Reply(reply)))
            },
            Err(e) => Ok((real, Real::Failed(e))),
        }
    }

    fn to_call(&self, op: &Operation) -> Result<ChatCall, ValidatorError> {
        let max_chars = self.model.limits().max_message_chars;
        Ok(match op {
            Operation::CreateRoom { name, .. } => ChatCall::CreateRoom { room_name: name.clone() },
            Operation::DeleteRoom { room, .. } => {
                ChatCall::DeleteRoom { room_channel: self.channel_or_missing(*room) }
            },
            Operation::RestoreRoom { room, .. } => {
                ChatCall::RestoreRoom { room_channel: self.channel_or_missing(*room) }
            },
            Operation::InviteToRoom { room, invitee, .. } => ChatCall::InviteToRoom {
                room_channel: self.channel_or_missing(*room),
                new_member: self.key_alias(*invitee)?.clone(),
            },
            Operation::RemoveFromRoom { room, member, .. } => ChatCall::RemoveFromRoom {
                room_channel: self.channel_or_missing(*room),
                member_to_remove: self.key_alias(*member)?.clone(),
            },
            Operation::PromoteToOwner { room, member, .. } => ChatCall::PromoteToOwner {
                room_channel: self.channel_or_missing(*room),
                member: self.key_alias(*member)?.clone(),
            },
            Operation::DemoteOwner { room, owner, .. } => ChatCall::DemoteOwner {
                room_channel: self.channel_or_missing(*room),
                owner: self.key_alias(*owner)?.clone(),
            },
            Operation::SendMessage { room, content, .. } => ChatCall::SendMessage {
                room_channel: self.channel_or_missing(*room),
                message: content.to_text(max_chars),
            },
            Operation::GetMessages { room, .. } => {
                ChatCall::GetMessages { room_channel: self.channel_or_missing(*room) }
            },
            Operation::GetRooms { .. } => ChatCall::GetRooms,
            Operation::AdvanceTime { .. } => {
                return Err(ValidatorError::StateDivergence("AdvanceTime has no call".to_string()));
            },
        })
    }

    /// Channel of `room`, or one that no room uses.
    fn channel_or_missing(&self, room: ModelRoomId) -> RoomChannel {
        self.channel(room)
            .cloned()
            .unwrap_or_else(|| RoomChannel::from_u128(u128::MAX - u128::from(room)))
    }

    fn observe(
        &mut self,
        op: &Operation,
        reply: &CallReply,
    ) -> Result<OperationResult, ValidatorError> {
        Ok(match reply {
            CallReply::Event(event) => {
                if matches!(op, Operation::CreateRoom { .. }) {
                    self.channels.push(event.data.room.channel.clone());
                }
                OperationResult::Ok
            },
            CallReply::Removal(RemoveOutcome::Removed(_)) => OperationResult::Ok,
            CallReply::Removal(RemoveOutcome::Rejected { .. }) => OperationResult::Rejected,
            CallReply::Messages(messages) => OperationResult::Messages(
                messages.iter().map(|m| self.model_message(m)).collect::<Result<_, _>>()?,
            ),
            CallReply::Rooms(rooms) => OperationResult::Rooms(
                rooms.iter().map(|r| self.room_id(&r.channel)).collect::<Result<_, _>>()?,
            ),
        })
    }

    fn check_delivered(&self, alias: &KeyAlias, event: &RoomEvent) -> Result<(), ValidatorError> {
        match self.network.events(alias).last() {
            Some(last) if last == event => Ok(()),
            last => Err(ValidatorError::StateDivergence(format!(
                "{alias} did not receive {}; last event {:?}",
                event.event_type(),
                last.map(RoomEvent::event_type)
            ))),
        }
    }

    fn observable_state(&self) -> Result<ObservableState, ValidatorError> {
        let contract = self.network.contract(&self.contract).ok_or_else(|| {
            ValidatorError::StateDivergence(format!("{} not published", self.contract))
        })?;
        if contract.room_count() != self.channels.len() {
            return Err(ValidatorError::StateDivergence(format!(
                "contract holds {} rooms, validator tracked {}",
                contract.room_count(),
                self.channels.len()
            )));
        }

        let mut rooms = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let snapshot = contract
                .room(channel)
                .ok_or_else(|| ValidatorError::StateDivergence(format!("room {channel} missing")))?;
            let messages = contract
                .messages(channel)
                .unwrap_or_default()
                .iter()
                .map(|m| self.model_message(m))
                .collect::<Result<_, _>>()?;

            rooms.push(ModelRoom {
                name: snapshot.name.clone(),
                creator: self.user_id(&snapshot.creator)?,
                owners: self.user_set(&snapshot.owners)?,
                members: self.user_set(&snapshot.members)?,
                deleted: snapshot.deleted,
                messages,
            });
        }

        let user_events = self.users.iter().map(|alias| self.network.events(alias).len()).collect();
        Ok(ObservableState { rooms, user_events })
    }

    fn check_invariants(&self) -> Result<(), ValidatorError> {
        let Some(contract) = self.network.contract(&self.contract) else {
            return Err(ValidatorError::Invariant(format!("{} not published", self.contract)));
        };
        let limits = contract.limits();

        for room in contract.rooms() {
            let channel = &room.channel;
            if room.owners.is_empty() {
                return Err(ValidatorError::Invariant(format!("room {channel} has no owner")));
            }
            if let Some(owner) = room.owners.iter().find(|owner| !room.is_member(owner)) {
                return Err(ValidatorError::Invariant(format!(
                    "room {channel}: owner {owner} is not a member"
                )));
            }
            if room.members.len() > limits.max_members_per_room {
                return Err(ValidatorError::Invariant(format!(
                    "room {channel} has {} members",
                    room.members.len()
                )));
            }

            let messages = contract.messages(channel).unwrap_or_default();
            if messages.len() > limits.max_messages_per_room {
                return Err(ValidatorError::Invariant(format!(
                    "room {channel} holds {} messages",
                    messages.len()
                )));
            }
            for (i, message) in messages.iter().enumerate() {
                if message.index != i as u64 {
                    return Err(ValidatorError::Invariant(format!(
                        "room {channel}: message {i} has index {}",
                        message.index
                    )));
                }
            }
            if messages.windows(2).any(|pair| pair[0].timestamp > pair[1].timestamp) {
                return Err(ValidatorError::Invariant(format!(
                    "room {channel}: timestamps decrease"
                )));
            }
        }
        Ok(())
    }

    fn user_id(&self, alias: &KeyAlias) -> Result<UserId, ValidatorError> {
        self.users
            .iter()
            .position(|candidate| candidate == alias)
            .and_then(|i| UserId::try_from(i).ok())
            .ok_or_else(|| ValidatorError::StateDivergence(format!("unknown key alias {alias}")))
    }

    fn model_message(&self, message: &Message) -> Result<ModelMessage, ValidatorError> {
        Ok(ModelMessage { sender: self.user_id(&message.sender)?, body: message.body.clone() })
    }

    fn user_set(&self, aliases: &[KeyAlias]) -> Result<BTreeSet<UserId>, ValidatorError> {
        aliases.iter().map(|alias| self.user_id(alias)).collect()
    }

    fn room_id(&self, channel: &RoomChannel) -> Result<ModelRoomId, ValidatorError> {
        self.channels
            .iter()
            .position(|candidate| candidate == channel)
            .and_then(|i| ModelRoomId::try_from(i).ok())
            .ok_or_else(|| ValidatorError::StateDivergence(format!("unknown room {channel}")))
    }
}

impl std::fmt::Debug for ChatValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatValidator")
            .field("contract", &self.contract)
            .field("users", &self.users.len())
            .field("rooms", &self.channels.len())
            .field("env", self.network.env())
            .finish()
    }
}

fn op_function(op: &Operation) -> &'static str {
    match op {
        Operation::CreateRoom { .. } => "create_room",
        Operation::DeleteRoom { .. } => "delete_room",
        Operation::RestoreRoom { .. } => "restore_room",
        Operation::InviteToRoom { .. } => "invite_to_room",
        Operation::RemoveFromRoom { .. } => "remove_from_room",
        Operation::PromoteToOwner { .. } => "promote_to_owner",
        Operation::DemoteOwner { .. } => "demote_owner",
        Operation::SendMessage { .. } => "send_message",
        Operation::GetMessages { .. } => "get_messages",
        Operation::GetRooms { .. } => "get_rooms",
        Operation::AdvanceTime { .. } => "advance_time",
    }
}

/// Model counterpart of a contract rule. `None` for failures the model
/// does not describe.
fn operation_error(error: &ChatError) -> Option<OperationError> {
    Some(match error {
        ChatError::InvalidRoomName => OperationError::InvalidRoomName,
        ChatError::RoomNotFound(_) => OperationError::RoomNotFound,
        ChatError::RoomDeleted(_) => OperationError::RoomDeleted,
        ChatError::RoomNotDeleted(_) => OperationError::RoomNotDeleted,
        ChatError::NotMember(_) => OperationError::NotMember,
        ChatError::NotOwner(_) => OperationError::NotOwner,
        ChatError::AlreadyMember(_) => OperationError::AlreadyMember,
        ChatError::TargetNotMember(_) => OperationError::TargetNotMember,
        ChatError::AlreadyOwner(_) => OperationError::AlreadyOwner,
        ChatError::TargetNotOwner(_) => OperationError::TargetNotOwner,
        ChatError::LastOwner => OperationError::LastOwner,
        ChatError::RoomFull { .. } => OperationError::RoomFull,
        ChatError::MessageTooLong { .. } => OperationError::MessageTooLong,
        ChatError::MessageLimitReached { .. } => OperationError::MessageLimitReached,
        ChatError::NoFreeChannel { .. } => return None,
    })
}
