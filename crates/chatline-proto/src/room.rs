//! Room and message views returned to callers.

use serde::{Deserialize, Serialize};

use crate::{KeyAlias, RoomChannel};

/// Point-in-time view of a room, embedded in every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    /// Room identifier.
    pub channel: RoomChannel,
    /// Display name (may be empty).
    pub name: String,
    /// Participant who created the room.
    pub creator: KeyAlias,
    /// Current owners, sorted when produced by a contract.
    pub owners: Vec<KeyAlias>,
    /// Current members (owners included), sorted when produced by a contract.
    pub members: Vec<KeyAlias>,
    /// Whether the room is currently deleted.
    pub deleted: bool,
}

impl RoomSnapshot {
    /// Whether `alias` is a member.
    ///
    /// Does not assume `members` is sorted; decoded snapshots may not be.
    pub fn is_member(&self, alias: &KeyAlias) -> bool {
        self.members.contains(alias)
    }

    /// Whether `alias` is an owner.
    pub fn is_owner(&self, alias: &KeyAlias) -> bool {
        self.owners.contains(alias)
    }
}

/// A message stored in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sender's alias.
    pub sender: KeyAlias,
    /// Message body.
    pub body: String,
    /// Milliseconds since the Unix epoch, non-decreasing within a room.
    pub timestamp: u64,
    /// Position in the room's log, dense from 0.
    pub index: u64,
}
