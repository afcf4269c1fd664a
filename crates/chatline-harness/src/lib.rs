//! Deterministic test harness for Chatline.
//!
//! # Model-Based Testing
//!
//! The `model` module holds a reference implementation of the room rules.
//! [`ChatValidator`] applies operations to both the model and a real
//! `Network<SimEnv>` and compares results, delivered events and final state.
//!
//! # Simulation
//!
//! [`SimEnv`] replaces wall-clock time and OS randomness with a virtual clock
//! and a seeded RNG. `sim_server` runs the production connection loop on a
//! turmoil host so client/server runs replay exactly from a seed.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod sim_env;
pub mod sim_server;
pub mod validator;

pub use model::{
    MODEL_ROOM_CAPACITY, MODEL_USER_CAPACITY, MessageContent, ModelMessage, ModelRoom,
    ModelRoomId, ModelWorld, ObservableState, Operation, OperationError, OperationResult,
    SmallMessage, UserId,
};
pub use sim_env::SimEnv;
pub use sim_server::{SIM_SERVER_PORT, connect, create_shared_state, run_sim_server};
pub use validator::{ChatValidator, ValidatorConfig, ValidatorError};
