//! Chatline wire types.
//!
//! Everything that crosses a process boundary lives here: participant
//! identities, contract references, room snapshots, versioned events, the
//! contract call/reply pairs and the length-prefixed CBOR framing used by the
//! server.
//!
//! # Event naming
//!
//! Events are typed as `<contract>/<language>-<version>/<EventName>`, for
//! example `chat/10-1.0.0/CreateRoomEvent`. Two published versions of the same
//! contract produce distinguishable event streams.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod call;
pub mod codec;
pub mod contract;
pub mod error;
pub mod event;
pub mod identity;
pub mod room;
pub mod wire;

pub use call::{CallReply, ChatCall, RemoveOutcome, SELF_REMOVAL_REASON};
pub use codec::{
    LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE, MESSAGE_ENCODING_OVERHEAD, RESPONSE_ENCODING_OVERHEAD,
    decode_frame, encode_frame,
};
pub use contract::ContractRef;
pub use error::ProtoError;
pub use event::{EventData, EventKind, RoomEvent};
pub use identity::{KeyAlias, RoomChannel, is_key_alias};
pub use room::{Message, RoomSnapshot};
pub use wire::{Request, Response};
