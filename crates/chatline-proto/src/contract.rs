//! Contract references.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of the chat contract.
pub const CHAT_CONTRACT: &str = "chat";

/// A published contract: name, semantic version and language version.
///
/// Displays as the event-type prefix, e.g. `chat/10-1.0.0`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractRef {
    /// Contract name.
    pub name: String,
    /// Contract version, e.g. `1.0.0`.
    pub version: String,
    /// Language (protocol) version the contract was written for.
    pub language: u32,
}

impl ContractRef {
    /// Create a contract reference.
    pub fn new(name: impl Into<String>, version: impl Into<String>, language: u32) -> Self {
        Self { name: name.into(), version: version.into(), language }
    }

    /// Chat contract 3.0.0 on language 9.
    pub fn chat_9() -> Self {
        Self::new(CHAT_CONTRACT, "3.0.0", 9)
    }

    /// Chat contract 1.0.0 on language 10.
    pub fn chat_10() -> Self {
        Self::new(CHAT_CONTRACT, "1.0.0", 10)
    }
}

impl fmt::Display for ContractRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}-{}", self.name, self.language, self.version)
    }
}
