//! Stamp transaction construction via the builder pattern.
//!
//! The [`StampTransactionBuilder`] fills the public and contract entries from
//! one set of values, so they can't disagree, and refuses oversized payloads
//! before any key material is touched. Signing happens in
//! [`super::signing`]; [`StampTransactionBuilder::sign`] is the shortcut
//! that does both.

use chrono::Utc;
use thiserror::Error;

use super::signing::sign_transaction;
use super::types::{BaseEntry, ContractEntry, PublicEntry, StampTransaction};
use crate::config::{DEFAULT_STAMP_AMOUNT, DEFAULT_STAMP_FEE, MAX_CONTRACT_DATA_BYTES};
use crate::crypto::{SigningContext, StampKeypair, StampPublicKey};
use crate::proof::CodecError;

/// Errors raised while building a transaction. Always raised before signing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("contract data is {size} bytes, max is {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("receiver public key not set")]
    MissingReceiver,

    #[error("sender public key not set")]
    MissingSender,

    #[error("payload encoding failed: {0}")]
    Encoding(String),
}

impl From<CodecError> for BuildError {
    fn from(e: CodecError) -> Self {
        BuildError::Encoding(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// StampTransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`StampTransaction`].
///
/// ```rust,no_run
/// use docstamp_protocol::crypto::{NetworkType, SigningContext, StampKeypair};
/// use docstamp_protocol::transaction::StampTransactionBuilder;
///
/// let service = StampKeypair::generate();
/// let receiver = StampKeypair::generate().public_key();
/// let tx = StampTransactionBuilder::new()
///     .receiver(receiver)
///     .data(b"{...}".to_vec())
///     .nonce(1)
///     .sign(&service, &SigningContext::transaction(NetworkType::Devnet))
///     .unwrap();
/// assert!(tx.is_signed());
/// ```
///
/// Defaults: amount and fee of 1, nonce 0, the current time as timestamp,
/// and the ledger's contract-data limit.
#[derive(Debug, Clone)]
pub struct StampTransactionBuilder {
    sender: Option<StampPublicKey>,
    receiver: Option<StampPublicKey>,
    amount: u64,
    fee: u64,
    nonce: u64,
    timestamp: Option<u64>,
    data: Vec<u8>,
    max_data_bytes: usize,
}

impl Default for StampTransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StampTransactionBuilder {
    pub fn new() -> Self {
        Self {
            sender: None,
            receiver: None,
            amount: DEFAULT_STAMP_AMOUNT,
            fee: DEFAULT_STAMP_FEE,
            nonce: 0,
            timestamp: None,
            data: Vec::new(),
            max_data_bytes: MAX_CONTRACT_DATA_BYTES,
        }
    }

    /// Sets the sender key. [`Self::sign`] sets it from the keypair.
    pub fn sender(mut self, key: StampPublicKey) -> Self {
        self.sender = Some(key);
        self
    }

    pub fn receiver(mut self, key: StampPublicKey) -> Self {
        self.receiver = Some(key);
        self
    }

    pub fn amount(mut self, amount: u64) -> Self {
        self.amount = amount;
        self
    }

    pub fn fee(mut self, fee: u64) -> Self {
        self.fee = fee;
        self
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Sets the timestamp explicitly (Unix milliseconds). Otherwise `build()`
    /// uses the current UTC time.
    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// The contract-entry payload.
    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// Lowers the payload limit, e.g. for a node configured below the
    /// ledger default.
    pub fn max_data_bytes(mut self, max: usize) -> Self {
        self.max_data_bytes = max;
        self
    }

    /// Produces an unsigned transaction.
    pub fn build(self) -> Result<StampTransaction, BuildError> {
        if self.data.len() > self.max_data_bytes {
            return Err(BuildError::PayloadTooLarge {
                size: self.data.len(),
                max: self.max_data_bytes,
            });
        }
        let sender = self.sender.ok_or(BuildError::MissingSender)?;
        let receiver = self.receiver.ok_or(BuildError::MissingReceiver)?;

        let timestamp = self
            .timestamp
            .unwrap_or_else(|| Utc::now().timestamp_millis() as u64);

        let base = BaseEntry {
            nonce: self.nonce,
            sender_public_key: sender,
            receiver_public_key: receiver,
            transaction_fees: self.fee,
        };

        Ok(StampTransaction {
            public_entry: PublicEntry {
                amount: self.amount,
                base: base.clone(),
            },
            contract_entry: ContractEntry {
                amount: self.amount,
                base,
                data: self.data,
            },
            timestamp,
            signature: None,
        })
    }

    /// Builds with `keypair` as sender and signs under `context`.
    pub fn sign(
        self,
        keypair: &StampKeypair,
        context: &SigningContext,
    ) -> Result<StampTransaction, BuildError> {
        let mut tx = self.sender(keypair.public_key()).build()?;
        sign_transaction(&mut tx, keypair, context)
            .map_err(|e| BuildError::Encoding(e.to_string()))?;
        Ok(tx)
    }
}

/// Builds and signs a stamp transaction carrying `payload`.
///
/// Fails with [`BuildError::PayloadTooLarge`] if `payload` exceeds the
/// contract-data limit. Nothing is signed in that case.
pub fn build_stamp_transaction(
    sender: &StampKeypair,
    receiver: StampPublicKey,
    payload: Vec<u8>,
    amount: u64,
    fee: u64,
    nonce: u64,
    context: &SigningContext,
) -> Result<StampTransaction, BuildError> {
    StampTransactionBuilder::new()
        .receiver(receiver)
        .data(payload)
        .amount(amount)
        .fee(fee)
        .nonce(nonce)
        .sign(sender, context)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::NetworkType;
    use crate::transaction::verification::verify_transaction;

    fn ctx() -> SigningContext {
        SigningContext::transaction(NetworkType::Devnet)
    }

    #[test]
    fn test_build_fills_both_entries_identically() {
        let kp = StampKeypair::generate();
        let receiver = StampKeypair::generate().public_key();
        let tx = build_stamp_transaction(&kp, receiver, b"proof".to_vec(), 5, 2, 9, &ctx()).unwrap();

        assert_eq!(tx.public_entry.amount, 5);
        assert_eq!(tx.contract_entry.amount, 5);
        assert_eq!(tx.public_entry.base, tx.contract_entry.base);
        assert_eq!(tx.public_entry.base.transaction_fees, 2);
        assert_eq!(tx.nonce(), 9);
        assert_eq!(tx.sender_public_key(), &kp.public_key());
        assert_eq!(tx.receiver_public_key(), &receiver);
        assert_eq!(tx.contract_data(), b"proof");
    }

    #[test]
    fn test_built_transaction_is_self_consistent() {
        let kp = StampKeypair::generate();
        let tx = build_stamp_transaction(
            &kp,
            StampKeypair::generate().public_key(),
            b"proof".to_vec(),
            1,
            1,
            1,
            &ctx(),
        )
        .unwrap();
        assert!(tx.is_signed());
        assert!(verify_transaction(&tx).is_ok());
        assert_eq!(tx.signature.as_ref().unwrap().signing_context, ctx());
    }

    #[test]
    fn test_timestamp_is_stamped_at_build_time() {
        let before = Utc::now().timestamp_millis() as u64;
        let tx = StampTransactionBuilder::new()
            .sender(StampKeypair::generate().public_key())
            .receiver(StampKeypair::generate().public_key())
            .build()
            .unwrap();
        let after = Utc::now().timestamp_millis() as u64;
        assert!(tx.timestamp >= before && tx.timestamp <= after);
    }

    #[test]
    fn test_explicit_timestamp_is_kept() {
        let tx = StampTransactionBuilder::new()
            .sender(StampKeypair::generate().public_key())
            .receiver(StampKeypair::generate().public_key())
            .timestamp(42)
            .build()
            .unwrap();
        assert_eq!(tx.timestamp, 42);
    }

    #[test]
    fn test_payload_at_limit_builds() {
        let kp = StampKeypair::generate();
        let payload = vec![b'x'; MAX_CONTRACT_DATA_BYTES];
        let tx = build_stamp_transaction(
            &kp,
            StampKeypair::generate().public_key(),
            payload,
            1,
            1,
            1,
            &ctx(),
        );
        assert!(tx.is_ok());
    }

    #[test]
    fn test_payload_one_byte_over_fails() {
        let kp = StampKeypair::generate();
        let payload = vec![b'x'; MAX_CONTRACT_DATA_BYTES + 1];
        let err = build_stamp_transaction(
            &kp,
            StampKeypair::generate().public_key(),
            payload,
            1,
            1,
            1,
            &ctx(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            BuildError::PayloadTooLarge {
                size: MAX_CONTRACT_DATA_BYTES + 1,
                max: MAX_CONTRACT_DATA_BYTES,
            }
        );
    }

    #[test]
    fn test_configured_limit_is_enforced() {
        let err = StampTransactionBuilder::new()
            .sender(StampKeypair::generate().public_key())
            .receiver(StampKeypair::generate().public_key())
            .max_data_bytes(4)
            .data(b"12345".to_vec())
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::PayloadTooLarge { size: 5, max: 4 }));
    }

    #[test]
    fn test_missing_receiver_fails() {
        let err = StampTransactionBuilder::new()
            .sign(&StampKeypair::generate(), &ctx())
            .unwrap_err();
        assert_eq!(err, BuildError::MissingReceiver);
    }

    #[test]
    fn test_signatures_differ_per_network() {
        let kp = StampKeypair::generate();
        let receiver = StampKeypair::generate().public_key();
        let builder = StampTransactionBuilder::new()
            .receiver(receiver)
            .timestamp(1)
            .nonce(1);
        let devnet = builder
            .clone()
            .sign(&kp, &SigningContext::transaction(NetworkType::Devnet))
            .unwrap();
        let mainnet = builder
            .sign(&kp, &SigningContext::transaction(NetworkType::Mainnet))
            .unwrap();
        assert_eq!(devnet.signable_bytes(), mainnet.signable_bytes());
        assert_ne!(devnet.id(), mainnet.id());
    }
}
