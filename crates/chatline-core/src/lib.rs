//! Chatline core.
//!
//! The chat contract and the simulated network that runs it.
//!
//! ## Architecture
//!
//! ```text
//! chatline-core
//!   ├─ Environment   (time + randomness; system or simulated)
//!   ├─ Wallet        (participant signing keys, nonces)
//!   ├─ Network       (verifying keys, nonces, publishing, event delivery)
//!   ├─ ChatContract  (rooms, membership, ownership, messages)
//!   └─ ChatClient    (typed handle: one contract version, one key alias)
//! ```
//!
//! Two versions of the contract (`chat 3.0.0 @ 9` and `chat 1.0.0 @ 10`) can
//! be published side by side; each keeps its own rooms and tags its events
//! with its own type prefix.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
pub mod contract;
pub mod env;
mod error;
mod limits;
pub mod network;
mod room;
pub mod transaction;
pub mod wallet;

pub use chatline_proto as proto;
pub use client::ChatClient;
pub use contract::{ChatContract, Emission, Execution, Removal};
pub use env::Environment;
pub use error::{ChatError, NetworkError};
pub use limits::{
    ChatLimits, DEFAULT_MAX_MEMBERS_PER_ROOM, DEFAULT_MAX_MESSAGE_CHARS,
    DEFAULT_MAX_MESSAGES_PER_ROOM,
};
pub use network::{INITIAL_PROTOCOL_VERSION, Network};
pub use transaction::{SignedTransaction, Transaction};
pub use wallet::Wallet;
