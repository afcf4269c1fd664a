//! Per-room state.

use std::collections::BTreeSet;

use chatline_proto::{KeyAlias, Message, RoomChannel, RoomSnapshot};

/// Mutable state of a single room.
///
/// # Invariants
///
/// - `owners` is a subset of `members`
/// - a room always has at least one owner
/// - `messages[i].index == i`, timestamps non-decreasing
#[derive(Debug, Clone)]
pub(crate) struct Room {
    pub(crate) channel: RoomChannel,
    pub(crate) name: String,
    pub(crate) creator: KeyAlias,
    pub(crate) owners: BTreeSet<KeyAlias>,
    pub(crate) members: BTreeSet<KeyAlias>,
    pub(crate) deleted: bool,
    pub(crate) messages: Vec<Message>,
}

impl Room {
    pub(crate) fn new(channel: RoomChannel, name: String, creator: KeyAlias) -> Self {
        let owners = BTreeSet::from([creator.clone()]);
        let members = BTreeSet::from([creator.clone()]);
        Self { channel, name, creator, owners, members, deleted: false, messages: Vec::new() }
    }

    pub(crate) fn is_member(&self, alias: &KeyAlias) -> bool {
        self.members.contains(alias)
    }

    pub(crate) fn is_owner(&self, alias: &KeyAlias) -> bool {
        self.owners.contains(alias)
    }

    /// Append a message, clamping its timestamp to the previous one.
    pub(crate) fn append(&mut self, sender: KeyAlias, body: String, now_millis: u64) -> &Message {
        let timestamp =
            self.messages.last().map_or(now_millis, |last| last.timestamp.max(now_millis));
        let index = self.messages.len() as u64;
        self.messages.push(Message { sender, body, timestamp, index });
        &self.messages[self.messages.len() - 1]
    }

    pub(crate) fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            channel: self.channel.clone(),
            name: self.name.clone(),
            creator: self.creator.clone(),
            owners: self.owners.iter().cloned().collect(),
            members: self.members.iter().cloned().collect(),
            deleted: self.deleted,
        }
    }
}
