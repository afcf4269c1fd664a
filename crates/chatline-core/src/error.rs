//! Contract and network error types.

use chatline_proto::{ContractRef, KeyAlias, ProtoError, RoomChannel};
use thiserror::Error;

/// A chat contract rule was violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Room names must not contain NUL.
    #[error("room name must not contain a null byte")]
    InvalidRoomName,

    /// No room with this channel.
    #[error("room not found: {0}")]
    RoomNotFound(RoomChannel),

    /// The room is deleted.
    #[error("room is deleted: {0}")]
    RoomDeleted(RoomChannel),

    /// `restore_room` on a live room.
    #[error("room is not deleted: {0}")]
    RoomNotDeleted(RoomChannel),

    /// The caller is not a member.
    #[error("{0} is not a member of the room")]
    NotMember(KeyAlias),

    /// The caller is not an owner.
    #[error("{0} is not an owner of the room")]
    NotOwner(KeyAlias),

    /// Invitee is already a member.
    #[error("{0} is already a member of the room")]
    AlreadyMember(KeyAlias),

    /// Target of remove/promote is not a member.
    #[error("{0} is not a member of the room")]
    TargetNotMember(KeyAlias),

    /// Promotee is already an owner.
    #[error("{0} is already an owner of the room")]
    AlreadyOwner(KeyAlias),

    /// Demotee is not an owner.
    #[error("{0} is not an owner of the room")]
    TargetNotOwner(KeyAlias),

    /// Demoting would leave the room without owners.
    #[error("cannot demote the last owner of the room")]
    LastOwner,

    /// Member limit reached.
    #[error("room is full ({limit} members)")]
    RoomFull {
        /// Configured member limit.
        limit: usize,
    },

    /// Message body exceeds the character limit.
    #[error("message too long: {len} characters (max {max})")]
    MessageTooLong {
        /// Length of the rejected body.
        len: usize,
        /// Configured limit.
        max: usize,
    },

    /// Message limit reached.
    #[error("room holds the maximum of {limit} messages")]
    MessageLimitReached {
        /// Configured message limit.
        limit: usize,
    },

    /// Every drawn room channel was already in use.
    #[error("no unused room channel after {draws} draws")]
    NoFreeChannel {
        /// Channels drawn.
        draws: usize,
    },
}

/// Errors from the contract network.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// No participant registered under this alias.
    #[error("unknown key alias: {0}")]
    UnknownKeyAlias(KeyAlias),

    /// The contract has not been published.
    #[error("contract not published: {0}")]
    ContractNotPublished(ContractRef),

    /// Contract targets a newer language than the network runs.
    #[error("{contract} requires language {}, network runs {protocol}", .contract.language)]
    LanguageNotSupported {
        /// Contract being published.
        contract: ContractRef,
        /// Current protocol version.
        protocol: u32,
    },

    /// Protocol versions only move forward.
    #[error("cannot downgrade protocol from {current} to {requested}")]
    ProtocolDowngrade {
        /// Current protocol version.
        current: u32,
        /// Requested protocol version.
        requested: u32,
    },

    /// Transaction signature did not verify.
    #[error("bad transaction signature from {0}")]
    BadSignature(KeyAlias),

    /// Transaction replayed, or submitted out of order.
    #[error("{alias} sent nonce {found}, expected {expected}")]
    NonceMismatch {
        /// Sender.
        alias: KeyAlias,
        /// Nonce the ledger accepts next.
        expected: u64,
        /// Nonce the transaction carried.
        found: u64,
    },

    /// Every drawn key alias was already registered.
    #[error("no unused key alias after {draws} draws")]
    NoFreeKeyAlias {
        /// Aliases drawn.
        draws: usize,
    },

    /// Transaction could not be encoded for signing or verification.
    #[error("transaction encoding failed: {0}")]
    Encode(#[from] ProtoError),

    /// The contract rejected the call.
    #[error("{function} failed: {source}")]
    CallFailed {
        /// Contract function that was called.
        function: &'static str,
        /// Rule that was violated.
        #[source]
        source: ChatError,
    },

    /// The contract answered with a reply of the wrong shape.
    #[error("{function} returned an unexpected reply")]
    UnexpectedReply {
        /// Contract function that was called.
        function: &'static str,
    },
}

impl NetworkError {
    /// The contract rule behind a `CallFailed`, if any.
    pub fn chat_error(&self) -> Option<&ChatError> {
        match self {
            Self::CallFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_failed_names_the_function() {
        let err = NetworkError::CallFailed {
            function: "create_room",
            source: ChatError::InvalidRoomName,
        };
        assert_eq!(err.to_string(), "create_room failed: room name must not contain a null byte");
        assert_eq!(err.chat_error(), Some(&ChatError::InvalidRoomName));
    }

    #[test]
    fn language_not_supported_display() {
        let err =
            NetworkError::LanguageNotSupported { contract: ContractRef::chat_10(), protocol: 9 };
        assert_eq!(err.to_string(), "chat/10-1.0.0 requires language 10, network runs 9");
    }
}
