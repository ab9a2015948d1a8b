//! Core type definitions for stamp transactions.
//!
//! A stamp transaction carries two entries that describe the same transfer:
//! a **public entry** the ledger uses for accounting, and a **contract
//! entry** whose `data` holds the encoded user proof. The ledger rejects a
//! transaction whose entries disagree on ownership or cost, so the builder
//! always fills both from the same values.

use serde::{Deserialize, Serialize};

use crate::crypto::encoding::base32_bytes;
use crate::crypto::{SigningContext, StampPublicKey, StampSignature};

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// Fields shared by every entry kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseEntry {
    /// Per-sender sequence number.
    pub nonce: u64,
    pub sender_public_key: StampPublicKey,
    pub receiver_public_key: StampPublicKey,
    pub transaction_fees: u64,
}

impl BaseEntry {
    fn write_signable(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        buf.extend_from_slice(self.sender_public_key.as_bytes());
        buf.extend_from_slice(self.receiver_public_key.as_bytes());
        buf.extend_from_slice(&self.transaction_fees.to_le_bytes());
    }
}

/// The accounting half of a stamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicEntry {
    pub amount: u64,
    pub base: BaseEntry,
}

/// The data-carrying half of a stamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractEntry {
    pub amount: u64,
    pub base: BaseEntry,
    /// Encoded `StampRequest`, see `proof::codec`.
    #[serde(with = "base32_bytes")]
    pub data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// StampTransaction
// ---------------------------------------------------------------------------

/// The sender's signature together with the context it was produced under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSignature {
    pub signature: StampSignature,
    pub signing_context: SigningContext,
}

/// A ledger transaction that records one stamp.
///
/// # Canonical Byte Format
///
/// [`StampTransaction::signable_bytes`] is what gets signed:
///
/// ```text
/// 0x01 || public.amount (u64 LE) || public.base
/// 0x02 || contract.amount (u64 LE) || contract.base || data_len (u32 LE) || data
/// timestamp (u64 LE)
/// ```
///
/// where `base` is `nonce (u64 LE) || sender (32) || receiver (32) || fees (u64 LE)`.
/// The signature itself is excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StampTransaction {
    pub public_entry: PublicEntry,
    pub contract_entry: ContractEntry,
    /// Unix milliseconds at build time.
    pub timestamp: u64,
    /// `None` until [`super::signing::sign_transaction`] runs.
    pub signature: Option<TransactionSignature>,
}

impl StampTransaction {
    /// Deterministic encoding of every field except the signature.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let data = &self.contract_entry.data;
        let mut buf = Vec::with_capacity(2 * 90 + data.len() + 16);

        buf.push(0x01);
        buf.extend_from_slice(&self.public_entry.amount.to_le_bytes());
        self.public_entry.base.write_signable(&mut buf);

        buf.push(0x02);
        buf.extend_from_slice(&self.contract_entry.amount.to_le_bytes());
        self.contract_entry.base.write_signable(&mut buf);
        buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
        buf.extend_from_slice(data);

        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf
    }

    /// The transaction id: upper-case base32 of the signature bytes.
    /// `None` for an unsigned transaction.
    pub fn id(&self) -> Option<String> {
        self.signature.as_ref().map(|s| s.signature.to_base32())
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// The key that is supposed to have signed this transaction.
    pub fn sender_public_key(&self) -> &StampPublicKey {
        &self.public_entry.base.sender_public_key
    }

    pub fn receiver_public_key(&self) -> &StampPublicKey {
        &self.public_entry.base.receiver_public_key
    }

    pub fn nonce(&self) -> u64 {
        self.public_entry.base.nonce
    }

    /// The embedded proof bytes.
    pub fn contract_data(&self) -> &[u8] {
        &self.contract_entry.data
    }
}
