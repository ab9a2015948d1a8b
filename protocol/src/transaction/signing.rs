//! Transaction signing with Ed25519 keypairs.
//!
//! The signing data is the canonical [`StampTransaction::signable_bytes`]
//! output, bound to a [`SigningContext`] so the signature can't be replayed
//! on another network or passed off as a different kind of message.

use super::types::{StampTransaction, TransactionSignature};
use super::verification::TransactionError;
use crate::crypto::{sign_with_context, SigningContext, StampKeypair};

/// Signs a transaction in place.
///
/// The keypair must own the sender key written into the entries; a
/// transaction signed by someone else would never pass
/// [`super::verify_transaction`], so it is refused here instead.
///
/// # Example
///
/// ```rust,no_run
/// use docstamp_protocol::crypto::{NetworkType, SigningContext, StampKeypair};
/// use docstamp_protocol::transaction::{sign_transaction, StampTransactionBuilder};
///
/// let keypair = StampKeypair::generate();
/// let mut tx = StampTransactionBuilder::new()
///     .sender(keypair.public_key())
///     .receiver(StampKeypair::generate().public_key())
///     .nonce(1)
///     .build()
///     .unwrap();
///
/// sign_transaction(&mut tx, &keypair, &SigningContext::transaction(NetworkType::Devnet)).unwrap();
/// assert!(tx.is_signed());
/// ```
pub fn sign_transaction<'a>(
    tx: &'a mut StampTransaction,
    keypair: &StampKeypair,
    context: &SigningContext,
) -> Result<&'a StampTransaction, TransactionError> {
    if tx.sender_public_key() != &keypair.public_key() {
        return Err(TransactionError::SignerMismatch);
    }
    let signature = sign_with_context(keypair, context, &tx.signable_bytes());
    tx.signature = Some(TransactionSignature {
        signature,
        signing_context: *context,
    });
    Ok(tx)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::NetworkType;
    use crate::transaction::builder::StampTransactionBuilder;

    fn unsigned_for(kp: &StampKeypair) -> StampTransaction {
        StampTransactionBuilder::new()
            .sender(kp.public_key())
            .receiver(StampKeypair::generate().public_key())
            .data(b"proof".to_vec())
            .nonce(1)
            .build()
            .unwrap()
    }

    fn ctx() -> SigningContext {
        SigningContext::transaction(NetworkType::Devnet)
    }

    #[test]
    fn test_sign_sets_signature_field() {
        let kp = StampKeypair::generate();
        let mut tx = unsigned_for(&kp);
        assert!(!tx.is_signed());
        sign_transaction(&mut tx, &kp, &ctx()).unwrap();
        assert!(tx.is_signed());
    }

    #[test]
    fn test_id_is_base32_of_signature() {
        let kp = StampKeypair::generate();
        let mut tx = unsigned_for(&kp);
        sign_transaction(&mut tx, &kp, &ctx()).unwrap();
        let id = tx.id().unwrap();
        // 64 bytes -> 103 unpadded base32 characters.
        assert_eq!(id.len(), 103);
        assert_eq!(id, id.to_ascii_uppercase());
        assert_eq!(id, tx.signature.as_ref().unwrap().signature.to_base32());
    }

    #[test]
    fn test_signing_is_deterministic() {
        let kp = StampKeypair::generate();
        let mut a = unsigned_for(&kp);
        let mut b = a.clone();
        sign_transaction(&mut a, &kp, &ctx()).unwrap();
        sign_transaction(&mut b, &kp, &ctx()).unwrap();
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_foreign_keypair_is_refused() {
        let owner = StampKeypair::generate();
        let other = StampKeypair::generate();
        let mut tx = unsigned_for(&owner);
        let err = sign_transaction(&mut tx, &other, &ctx()).unwrap_err();
        assert!(matches!(err, TransactionError::SignerMismatch));
        assert!(!tx.is_signed());
    }
}
