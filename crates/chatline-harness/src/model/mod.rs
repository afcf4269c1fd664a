//! Reference model of the chat contract.
//!
//! Users and rooms are small integers; there are no keys, signatures or
//! channels. Each rule is spelled out once per operation, in the order the
//! contract checks them, so the model can be read against the rules table
//! line by line. Given the same operations it always reaches the same state.

pub mod operation;
mod world;

pub use operation::{
    MODEL_ROOM_CAPACITY, MODEL_USER_CAPACITY, MessageContent, ModelMessage, ModelRoomId,
    Operation, OperationError, OperationResult, SmallMessage, UserId,
};
pub use world::{ModelRoom, ModelWorld, ObservableState};
