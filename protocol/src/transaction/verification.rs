//! Transaction verification: structural checks and cryptographic validation.
//!
//! [`verify_transaction`] is the self-consistency check every stamp
//! transaction must pass, whether we just built it or just read it back from
//! the ledger. It says nothing about the user proof embedded in the contract
//! entry; that is `proof::verify_request`'s job.
//!
//! Checks run cheapest first: entry agreement, timestamp, then the
//! signature.

use chrono::Utc;
use thiserror::Error;

use super::types::StampTransaction;
use crate::crypto::{verify_with_context, SigningContext};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// The transaction carries no signature.
    #[error("transaction is unsigned")]
    MissingSignature,

    /// The signature does not verify against the sender key in the entries.
    #[error("invalid signature: does not verify against sender {sender}")]
    InvalidSignature { sender: String },

    /// A signing keypair does not own the transaction's sender key.
    #[error("signing keypair does not match the sender public key")]
    SignerMismatch,

    /// Public and contract entries disagree on `field`.
    #[error("public and contract entries disagree on {field}")]
    EntryMismatch { field: &'static str },

    /// Signed under a different network or purpose than expected.
    #[error("signing context mismatch: expected {expected:?}, got {actual:?}")]
    ContextMismatch {
        expected: SigningContext,
        actual: SigningContext,
    },

    #[error("timestamp {timestamp_ms} is {delta_secs}s in the future (max allowed: {max_secs}s)")]
    TimestampTooFarInFuture {
        timestamp_ms: u64,
        delta_secs: i64,
        max_secs: i64,
    },
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Tolerated clock skew between this service and the ledger, in seconds.
const MAX_FUTURE_SECONDS: i64 = 300;

/// Verifies a signed transaction:
///
/// 1. **Entry agreement** on amount, fee, nonce, sender and receiver.
/// 2. **Timestamp** no more than 5 minutes in the future.
/// 3. **Signature present.**
/// 4. **Signature valid** for the sender key, under the context it claims.
///
/// Returns the first failing check.
pub fn verify_transaction(tx: &StampTransaction) -> Result<(), TransactionError> {
    check_entries(tx)?;
    check_timestamp(tx)?;

    let signed = tx
        .signature
        .as_ref()
        .ok_or(TransactionError::MissingSignature)?;

    let sender = tx.sender_public_key();
    if !verify_with_context(
        sender,
        &signed.signing_context,
        &tx.signable_bytes(),
        &signed.signature,
    ) {
        return Err(TransactionError::InvalidSignature {
            sender: sender.to_base32(),
        });
    }
    Ok(())
}

/// [`verify_transaction`], and additionally require the signature to have
/// been made under `expected`.
pub fn verify_transaction_in_context(
    tx: &StampTransaction,
    expected: &SigningContext,
) -> Result<(), TransactionError> {
    if let Some(signed) = &tx.signature {
        if &signed.signing_context != expected {
            return Err(TransactionError::ContextMismatch {
                expected: *expected,
                actual: signed.signing_context,
            });
        }
    }
    verify_transaction(tx)
}

fn check_entries(tx: &StampTransaction) -> Result<(), TransactionError> {
    let public = &tx.public_entry;
    let contract = &tx.contract_entry;

    if public.amount != contract.amount {
        return Err(TransactionError::EntryMismatch { field: "amount" });
    }
    if public.base.transaction_fees != contract.base.transaction_fees {
        return Err(TransactionError::EntryMismatch {
            field: "transaction_fees",
        });
    }
    if public.base.nonce != contract.base.nonce {
        return Err(TransactionError::EntryMismatch { field: "nonce" });
    }
    if public.base.sender_public_key != contract.base.sender_public_key {
        return Err(TransactionError::EntryMismatch {
            field: "sender_public_key",
        });
    }
    if public.base.receiver_public_key != contract.base.receiver_public_key {
        return Err(TransactionError::EntryMismatch {
            field: "receiver_public_key",
        });
    }
    Ok(())
}

fn check_timestamp(tx: &StampTransaction) -> Result<(), TransactionError> {
    let now_ms = Utc::now().timestamp_millis() as u64;
    let max_future_ms = now_ms + (MAX_FUTURE_SECONDS as u64 * 1_000);
    if tx.timestamp > max_future_ms {
        let delta_secs = (tx.timestamp as i64 - now_ms as i64) / 1_000;
        return Err(TransactionError::TimestampTooFarInFuture {
            timestamp_ms: tx.timestamp,
            delta_secs,
            max_secs: MAX_FUTURE_SECONDS,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{NetworkType, StampKeypair};
    use crate::transaction::builder::{build_stamp_transaction, StampTransactionBuilder};
    use crate::transaction::signing::sign_transaction;

    fn ctx() -> SigningContext {
        SigningContext::transaction(NetworkType::Devnet)
    }

    fn signed() -> (StampKeypair, StampTransaction) {
        let kp = StampKeypair::generate();
        let tx = build_stamp_transaction(
            &kp,
            StampKeypair::generate().public_key(),
            b"proof".to_vec(),
            1,
            1,
            3,
            &ctx(),
        )
        .unwrap();
        (kp, tx)
    }

    #[test]
    fn test_valid_transaction_passes() {
        let (_, tx) = signed();
        assert_eq!(verify_transaction(&tx), Ok(()));
        assert_eq!(verify_transaction_in_context(&tx, &ctx()), Ok(()));
    }

    #[test]
    fn test_unsigned_transaction_fails() {
        let (_, mut tx) = signed();
        tx.signature = None;
        assert_eq!(
            verify_transaction(&tx),
            Err(TransactionError::MissingSignature)
        );
    }

    #[test]
    fn test_tampered_payload_fails() {
        let (_, mut tx) = signed();
        tx.contract_entry.data = b"forged".to_vec();
        assert!(matches!(
            verify_transaction(&tx),
            Err(TransactionError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn test_swapped_sender_fails() {
        let (_, mut tx) = signed();
        let other = StampKeypair::generate().public_key();
        tx.public_entry.base.sender_public_key = other;
        tx.contract_entry.base.sender_public_key = other;
        assert!(matches!(
            verify_transaction(&tx),
            Err(TransactionError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn test_entry_disagreement_is_reported_by_field() {
        let (_, tx) = signed();

        let mut bad = tx.clone();
        bad.contract_entry.amount += 1;
        assert_eq!(
            verify_transaction(&bad),
            Err(TransactionError::EntryMismatch { field: "amount" })
        );

        let mut bad = tx.clone();
        bad.contract_entry.base.nonce += 1;
        assert_eq!(
            verify_transaction(&bad),
            Err(TransactionError::EntryMismatch { field: "nonce" })
        );

        let mut bad = tx;
        bad.public_entry.base.receiver_public_key = StampKeypair::generate().public_key();
        assert_eq!(
            verify_transaction(&bad),
            Err(TransactionError::EntryMismatch {
                field: "receiver_public_key"
            })
        );
    }

    #[test]
    fn test_wrong_context_is_reported() {
        let (_, tx) = signed();
        let mainnet = SigningContext::transaction(NetworkType::Mainnet);
        assert!(matches!(
            verify_transaction_in_context(&tx, &mainnet),
            Err(TransactionError::ContextMismatch { .. })
        ));
    }

    #[test]
    fn test_relabelled_context_fails_signature() {
        let (_, mut tx) = signed();
        if let Some(sig) = tx.signature.as_mut() {
            sig.signing_context = SigningContext::transaction(NetworkType::Mainnet);
        }
        assert!(matches!(
            verify_transaction(&tx),
            Err(TransactionError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn test_far_future_timestamp_fails() {
        let kp = StampKeypair::generate();
        let far_future = Utc::now().timestamp_millis() as u64 + 3_600_000;
        let mut tx = StampTransactionBuilder::new()
            .sender(kp.public_key())
            .receiver(StampKeypair::generate().public_key())
            .timestamp(far_future)
            .build()
            .unwrap();
        sign_transaction(&mut tx, &kp, &ctx()).unwrap();
        assert!(matches!(
            verify_transaction(&tx),
            Err(TransactionError::TimestampTooFarInFuture { .. })
        ));
    }
}
