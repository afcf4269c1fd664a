//! Participant and room identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtoError;

/// Prefix shared by every key alias.
const KEY_ALIAS_PREFIX: &str = "KA-";

/// Number of decimal digits following the prefix.
const KEY_ALIAS_DIGITS: usize = 16;

/// Alias numbers are reduced modulo this (10^16).
const KEY_ALIAS_MODULUS: u64 = 10_000_000_000_000_000;

/// Number of hex digits in a room channel.
const ROOM_CHANNEL_DIGITS: usize = 32;

/// Network identity of a participant, e.g. `KA-0000000000000042`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyAlias(String);

impl KeyAlias {
    /// Build an alias from its numeric part (reduced to 16 digits).
    pub fn from_number(number: u64) -> Self {
        let number = number % KEY_ALIAS_MODULUS;
        Self(format!("{KEY_ALIAS_PREFIX}{number:016}"))
    }

    /// Parse and validate an alias string.
    pub fn parse(value: &str) -> Result<Self, ProtoError> {
        if is_key_alias(value) {
            Ok(Self(value.to_owned()))
        } else {
            Err(ProtoError::InvalidKeyAlias(value.to_owned()))
        }
    }

    /// The alias as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Whether `value` is exactly `KA-` followed by 16 ASCII digits.
pub fn is_key_alias(value: &str) -> bool {
    value.strip_prefix(KEY_ALIAS_PREFIX).is_some_and(|digits| {
        digits.len() == KEY_ALIAS_DIGITS && digits.bytes().all(|b| b.is_ascii_digit())
    })
}

impl fmt::Display for KeyAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for KeyAlias {
    type Error = ProtoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_key_alias(&value) { Ok(Self(value)) } else { Err(ProtoError::InvalidKeyAlias(value)) }
    }
}

impl From<KeyAlias> for String {
    fn from(alias: KeyAlias) -> Self {
        alias.0
    }
}

/// Opaque room identifier handed out by `create_room`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomChannel(String);

impl RoomChannel {
    /// Build a channel from 128 random bits.
    pub fn from_u128(value: u128) -> Self {
        Self(format!("{value:032x}"))
    }

    /// Parse and validate a channel string.
    pub fn parse(value: &str) -> Result<Self, ProtoError> {
        Self::try_from(value.to_owned())
    }

    /// The channel as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomChannel {
    type Error = ProtoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let valid = value.len() == ROOM_CHANNEL_DIGITS
            && value.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid { Ok(Self(value)) } else { Err(ProtoError::InvalidRoomChannel(value)) }
    }
}

impl From<RoomChannel> for String {
    fn from(channel: RoomChannel) -> Self {
        channel.0
    }
}
