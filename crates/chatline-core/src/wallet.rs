//! Participant-side signing keys.

use std::collections::HashMap;

use chatline_proto::{ChatCall, ContractRef, KeyAlias};
use ed25519_dalek::{SigningKey, VerifyingKey};

use crate::{
    NetworkError,
    transaction::{SignedTransaction, Transaction},
};

struct WalletKey {
    signing_key: SigningKey,
    /// Nonce for the next transaction this key signs.
    next_nonce: u64,
}

/// Signing keys of every participant, keyed by alias.
///
/// The wallet never verifies anything. The network only ever sees the
/// verifying half of each key.
#[derive(Default)]
pub struct Wallet {
    keys: HashMap<KeyAlias, WalletKey>,
}

impl Wallet {
    /// Empty wallet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `signing_key` for `alias` and return its verifying half.
    pub(crate) fn insert(&mut self, alias: KeyAlias, signing_key: SigningKey) -> VerifyingKey {
        let verifying_key = signing_key.verifying_key();
        self.keys.insert(alias, WalletKey { signing_key, next_nonce: 0 });
        verifying_key
    }

    /// Whether the wallet holds a key for `alias`.
    pub fn contains(&self, alias: &KeyAlias) -> bool {
        self.keys.contains_key(alias)
    }

    /// Sign `call` as `alias` with its next nonce.
    ///
    /// The nonce advances whether or not the transaction is later accepted.
    pub fn sign(
        &mut self,
        alias: &KeyAlias,
        contract: &ContractRef,
        call: ChatCall,
    ) -> Result<SignedTransaction, NetworkError> {
        let key =
            self.keys.get_mut(alias).ok_or_else(|| NetworkError::UnknownKeyAlias(alias.clone()))?;

        let transaction = Transaction {
            sender: alias.clone(),
            nonce: key.next_nonce,
            contract: contract.clone(),
            call,
        };
        let signed = transaction.sign(&key.signing_key)?;
        key.next_nonce += 1;
        Ok(signed)
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet").field("keys", &self.keys.len()).finish_non_exhaustive()
    }
}
