//! Client/server request and response messages.

use serde::{Deserialize, Serialize};

use crate::{CallReply, ChatCall, ContractRef, KeyAlias, RoomEvent};

/// Request sent by a client to the chat server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Register a username bound to the connecting address.
    CreateUser {
        /// Requested username.
        username: String,
    },
    /// List registered usernames.
    ListUsers,
    /// Call the chat contract as `username`.
    Chat {
        /// Acting user.
        username: String,
        /// Contract version to call.
        contract: ContractRef,
        /// The call itself.
        call: ChatCall,
    },
    /// Fetch one page of the events delivered to `username`.
    Events {
        /// User whose events to fetch.
        username: String,
        /// Position in the user's event log to start from.
        since: u64,
    },
}

/// Server response to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    /// User registered with a fresh key alias.
    UserCreated {
        /// Alias assigned to the user.
        key_alias: KeyAlias,
    },
    /// Registered usernames, sorted.
    Users(Vec<String>),
    /// Contract call succeeded.
    Chat(CallReply),
    /// One page of events delivered to the user, oldest first.
    Events {
        /// The page. Empty once the client has caught up.
        events: Vec<RoomEvent>,
        /// `since` for the following page.
        next: u64,
    },
    /// Request failed. The connection stays open.
    Error {
        /// Human-readable failure description.
        message: String,
    },
}
