//! Fuzz target for the chat contract against the reference model
//!
//! # Strategy
//!
//! - Operation sequences: arbitrary calls from arbitrary users, including
//!   missing rooms, NUL room names and over-limit messages
//! - Tight limits: small member/message caps so every limit is reachable
//! - Time: `AdvanceTime` interleaved with calls
//!
//! # Invariants
//!
//! - Every call result matches the model
//! - Every successful mutation reaches the acting user
//! - Final room state and per-user event counts match the model
//! - Rooms always keep an owner; owners are always members
//! - Message indices are dense and timestamps never decrease
//! - NEVER panic on any call sequence

#![no_main]

use arbitrary::Arbitrary;
use chatline_harness::{ChatValidator, Operation, ValidatorConfig};
use chatline_proto::ContractRef;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    seed: u64,
    num_users: u8,
    legacy_contract: bool,
    tight_limits: bool,
    operations: Vec<Operation>,
}

fuzz_target!(|input: FuzzInput| {
    let num_users = usize::from(input.num_users % 8) + 1;
    let mut config = ValidatorConfig { num_users, seed: input.seed, ..ValidatorConfig::default() };
    if input.legacy_contract {
        config.contract = ContractRef::chat_9();
    }
    if input.tight_limits {
        config.limits.max_members_per_room = 3;
        config.limits.max_messages_per_room = 4;
        config.limits.max_message_chars = 12;
    }

    let mut validator = match ChatValidator::with_config(config) {
        Ok(validator) => validator,
        Err(e) => panic!("validator setup failed: {e}"),
    };

    for (i, op) in input.operations.into_iter().take(256).enumerate() {
        let op = op.clamp_users(num_users);
        if let Err(e) = validator.apply(&op) {
            panic!("operation {i} ({op:?}) failed: {e}");
        }
    }

    if let Err(e) = validator.teardown() {
        panic!("teardown failed: {e}");
    }
});
