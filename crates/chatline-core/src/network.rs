//! Simulated contract network.
//!
//! The network plays the role of the ledger: it holds each participant's
//! verifying key and nonce, runs published contracts, and delivers events to
//! participants. Signing keys live in the participant-side [`Wallet`].
//!
//! ## Call pipeline
//!
//! ```text
//! call(alias, contract, ChatCall)
//!   ├─ wallet signs transaction    (UnknownKeyAlias; Ed25519, next nonce)
//!   └─ submit(SignedTransaction)
//!        ├─ lookup account         (UnknownKeyAlias)
//!        ├─ verify signature       (BadSignature)
//!        ├─ check nonce            (NonceMismatch)
//!        ├─ route to contract      (ContractNotPublished)
//!        ├─ execute                (CallFailed { function, source })
//!        └─ deliver event to recipients
//! ```
//!
//! A transaction that passes the signature and nonce checks consumes its
//! nonce even if the call then fails. Calls are applied one at a time
//! against `&mut self`, which gives every participant the same total order
//! of state changes.

use std::collections::{BTreeMap, HashMap};

use chatline_proto::{CallReply, ChatCall, ContractRef, KeyAlias, RoomEvent};
use ed25519_dalek::{SigningKey, VerifyingKey};

use crate::{
    ChatLimits, NetworkError,
    client::ChatClient,
    contract::{ChatContract, Execution},
    env::{Environment, MAX_ID_DRAWS, draw_unused},
    transaction::{SignedTransaction, Transaction},
    wallet::Wallet,
};

/// Protocol version a fresh network starts at.
pub const INITIAL_PROTOCOL_VERSION: u32 = 9;

/// Ledger entry of a registered participant.
struct Account {
    verifying_key: VerifyingKey,
    /// Nonce the next accepted transaction must carry.
    next_nonce: u64,
    /// Events delivered to this participant, oldest first.
    events: Vec<RoomEvent>,
}

/// In-process ledger of participants and published contracts.
///
/// # Type Parameters
///
/// - `E`: Environment implementation for time/randomness
pub struct Network<E: Environment> {
    env: E,
    protocol: u32,
    limits: ChatLimits,
    wallet: Wallet,
    accounts: HashMap<KeyAlias, Account>,
    contracts: BTreeMap<ContractRef, ChatContract>,
}

impl<E: Environment> Network<E> {
    /// Create a network with default limits.
    pub fn new(env: E) -> Self {
        Self::with_limits(env, ChatLimits::default())
    }

    /// Create a network whose contracts enforce `limits`.
    pub fn with_limits(env: E, limits: ChatLimits) -> Self {
        Self {
            env,
            protocol: INITIAL_PROTOCOL_VERSION,
            limits,
            wallet: Wallet::new(),
            accounts: HashMap::new(),
            contracts: BTreeMap::new(),
        }
    }

    /// The environment this network draws time and randomness from.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Current protocol (language) version.
    pub fn protocol_version(&self) -> u32 {
        self.protocol
    }

    /// Limits applied to newly published contracts.
    pub fn limits(&self) -> ChatLimits {
        self.limits
    }

    /// Move the network to a newer protocol version.
    ///
    /// Contracts published under older versions keep running.
    pub fn upgrade_protocol(&mut self, version: u32) -> Result<(), NetworkError> {
        if version < self.protocol {
            return Err(NetworkError::ProtocolDowngrade {
                current: self.protocol,
                requested: version,
            });
        }
        if version != self.protocol {
            tracing::info!(from = self.protocol, to = version, "protocol upgraded");
        }
        self.protocol = version;
        Ok(())
    }

    /// Publish contracts. Already-published contracts are left untouched.
    pub fn publish(&mut self, contracts: &[ContractRef]) -> Result<(), NetworkError> {
        if let Some(contract) = contracts.iter().find(|c| c.language > self.protocol) {
            return Err(NetworkError::LanguageNotSupported {
                contract: contract.clone(),
                protocol: self.protocol,
            });
        }

        for contract in contracts {
            if !self.contracts.contains_key(contract) {
                tracing::info!(%contract, "contract published");
                self.contracts
                    .insert(contract.clone(), ChatContract::new(contract.clone(), self.limits));
            }
        }
        Ok(())
    }

    /// Whether `contract` has been published.
    pub fn is_published(&self, contract: &ContractRef) -> bool {
        self.contracts.contains_key(contract)
    }

    /// Read-only view of a published contract's state.
    pub fn contract(&self, contract: &ContractRef) -> Option<&ChatContract> {
        self.contracts.get(contract)
    }

    /// Register a new participant with a fresh signing key.
    ///
    /// # Errors
    ///
    /// `NetworkError::NoFreeKeyAlias` if every drawn alias is taken.
    pub fn register_key_alias(&mut self) -> Result<KeyAlias, NetworkError> {
        let env = &self.env;
        let accounts = &self.accounts;
        let alias = draw_unused(
            || KeyAlias::from_number(env.random_u64()),
            |candidate| accounts.contains_key(candidate),
        )
        .ok_or(NetworkError::NoFreeKeyAlias { draws: MAX_ID_DRAWS })?;

        self.insert_participant(alias.clone());
        tracing::info!(key_alias = %alias, "key alias registered");
        Ok(alias)
    }

    /// Register an alias issued by an earlier run, with a fresh signing key.
    ///
    /// Returns `false` if the alias is already registered.
    pub fn adopt_key_alias(&mut self, alias: KeyAlias) -> bool {
        if self.accounts.contains_key(&alias) {
            return false;
        }
        tracing::info!(key_alias = %alias, "key alias adopted");
        self.insert_participant(alias);
        true
    }

    fn insert_participant(&mut self, alias: KeyAlias) {
        let mut seed = [0u8; 32];
        self.env.random_bytes(&mut seed);
        let verifying_key = self.wallet.insert(alias.clone(), SigningKey::from_bytes(&seed));
        self.accounts.insert(alias, Account { verifying_key, next_nonce: 0, events: Vec::new() });
    }

    /// Whether `alias` is registered.
    pub fn has_key_alias(&self, alias: &KeyAlias) -> bool {
        self.accounts.contains_key(alias)
    }

    /// Nonce the next transaction from `alias` must carry.
    pub fn next_nonce(&self, alias: &KeyAlias) -> Option<u64> {
        self.accounts.get(alias).map(|account| account.next_nonce)
    }

    /// Events delivered to `alias`, oldest first. Empty for unknown aliases.
    pub fn events(&self, alias: &KeyAlias) -> &[RoomEvent] {
        self.accounts.get(alias).map(|a| a.events.as_slice()).unwrap_or_default()
    }

    /// At most `limit` events delivered to `alias`, starting at position
    /// `since` of its event log.
    pub fn events_since(&self, alias: &KeyAlias, since: usize, limit: usize) -> &[RoomEvent] {
        let events = self.events(alias);
        let start = since.min(events.len());
        let end = start.saturating_add(limit).min(events.len());
        &events[start..end]
    }

    /// Handle for calling `contract` as `alias`.
    pub fn chat(&mut self, contract: &ContractRef, alias: &KeyAlias) -> ChatClient<'_, E> {
        ChatClient::new(self, contract.clone(), alias.clone())
    }

    /// Sign a call as `alias` without submitting it.
    pub fn sign(
        &mut self,
        alias: &KeyAlias,
        contract: &ContractRef,
        call: ChatCall,
    ) -> Result<SignedTransaction, NetworkError> {
        self.wallet.sign(alias, contract, call)
    }

    /// Sign and execute a contract call as `alias`.
    ///
    /// # Errors
    ///
    /// Contract rule violations are wrapped in `NetworkError::CallFailed`,
    /// which displays as `"<function> failed: <reason>"`.
    pub fn call(
        &mut self,
        alias: &KeyAlias,
        contract: &ContractRef,
        call: ChatCall,
    ) -> Result<CallReply, NetworkError> {
        let signed = self.sign(alias, contract, call)?;
        self.submit(signed)
    }

    /// Verify and execute a signed transaction.
    pub fn submit(&mut self, signed: SignedTransaction) -> Result<CallReply, NetworkError> {
        let sender = signed.transaction.sender.clone();
        let account = self
            .accounts
            .get_mut(&sender)
            .ok_or_else(|| NetworkError::UnknownKeyAlias(sender.clone()))?;

        if !signed.verify(&account.verifying_key)? {
            tracing::warn!(key_alias = %sender, "transaction signature rejected");
            return Err(NetworkError::BadSignature(sender));
        }
        let nonce = signed.transaction.nonce;
        if nonce != account.next_nonce {
            tracing::warn!(
                key_alias = %sender,
                expected = account.next_nonce,
                found = nonce,
                "transaction nonce rejected"
            );
            return Err(NetworkError::NonceMismatch {
                alias: sender,
                expected: account.next_nonce,
                found: nonce,
            });
        }
        account.next_nonce += 1;

        let Transaction { contract, call, .. } = signed.transaction;
        let function = call.function();
        let instance = self
            .contracts
            .get_mut(&contract)
            .ok_or_else(|| NetworkError::ContractNotPublished(contract.clone()))?;

        let Execution { reply, recipients } =
            instance.execute(&sender, call, &self.env).map_err(|source| {
                tracing::debug!(
                    %contract,
                    key_alias = %sender,
                    function,
                    error = %source,
                    "call rejected"
                );
                NetworkError::CallFailed { function, source }
            })?;

        if let Some(event) = reply.event() {
            for recipient in &recipients {
                if let Some(account) = self.accounts.get_mut(recipient) {
                    account.events.push(event.clone());
                } else {
                    tracing::warn!(
                        key_alias = %recipient,
                        event = %event.event_type(),
                        "event for unregistered participant dropped"
                    );
                }
            }
        }

        Ok(reply)
    }
}

impl<E: Environment> std::fmt::Debug for Network<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("protocol", &self.protocol)
            .field("participants", &self.accounts.len())
            .field("contracts", &self.contracts.keys().collect::<Vec<_>>())
            .finish()
    }
}
