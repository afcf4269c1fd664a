//! Signed contract calls.
//!
//! A [`Transaction`] names the sender, its per-alias nonce, the contract and
//! the call. The sender signs the CBOR encoding of the transaction; the
//! network checks the signature against the sender's registered
//! `VerifyingKey` and accepts each nonce exactly once, in order.

use chatline_proto::{ChatCall, ContractRef, KeyAlias, ProtoError};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

/// An unsigned contract call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Alias the call is made as.
    pub sender: KeyAlias,
    /// Position in the sender's transaction sequence, from 0.
    pub nonce: u64,
    /// Contract version to call.
    pub contract: ContractRef,
    /// The call itself.
    pub call: ChatCall,
}

impl Transaction {
    /// Bytes covered by the signature.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, ProtoError> {
        let mut payload = Vec::new();
        ciborium::into_writer(self, &mut payload).map_err(|e| ProtoError::Encode(e.to_string()))?;
        Ok(payload)
    }

    /// Sign with `key`.
    pub fn sign(self, key: &SigningKey) -> Result<SignedTransaction, ProtoError> {
        let signature = key.sign(&self.signing_bytes()?);
        Ok(SignedTransaction { transaction: self, signature })
    }
}

/// A transaction together with its sender's signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// The signed call.
    pub transaction: Transaction,
    /// Ed25519 signature over [`Transaction::signing_bytes`].
    pub signature: Signature,
}

impl SignedTransaction {
    /// Whether the signature was made by the holder of `key`.
    pub fn verify(&self, key: &VerifyingKey) -> Result<bool, ProtoError> {
        let payload = self.transaction.signing_bytes()?;
        Ok(key.verify(&payload, &self.signature).is_ok())
    }
}
