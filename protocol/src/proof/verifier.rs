//! Signature verifier for user proofs.
//!
//! [`verify_request`] is the single yes/no gate. It runs at submission time
//! before anything touches the network, and again at retrieval time against
//! whatever came back from the ledger.

use tracing::debug;

use super::request::{StampRequest, ValidationError};
use crate::crypto::verify_raw;

/// `true` iff `request.signature` is a valid signature by
/// `request.public_key` over the request's canonical bytes.
///
/// Malformed keys and signatures are `false`, never an error.
pub fn verify_request(request: &StampRequest) -> bool {
    verify_raw(
        &request.public_key,
        &request.canonical_bytes(),
        &request.signature,
    )
}

/// Full submission-time check: field limits, then the signature.
pub fn validate_request(request: &StampRequest) -> Result<(), ValidationError> {
    request.check_fields()?;
    if !verify_request(request) {
        debug!(file_hash = %request.file_hash, "stamp request signature rejected");
        return Err(ValidationError::InvalidSignature);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{hash, StampKeypair};
    use crate::proof::request::sign_stamp_request;

    fn signed() -> StampRequest {
        let kp = StampKeypair::generate();
        sign_stamp_request(&kp, hash(b"quarterly report"), "report.pdf")
    }

    #[test]
    fn test_well_formed_request_verifies() {
        for name in ["a.pdf", "x", "scan 2026-10-19.png", "\u{00E9}t\u{00E9}.txt"] {
            let kp = StampKeypair::generate();
            let req = sign_stamp_request(&kp, hash(name.as_bytes()), name);
            assert!(verify_request(&req), "failed for {name}");
        }
    }

    #[test]
    fn test_flipping_any_signature_byte_fails() {
        let req = signed();
        for i in 0..req.signature.len() {
            let mut tampered = req.clone();
            tampered.signature[i] ^= 0x01;
            assert!(!verify_request(&tampered), "byte {i} of signature");
        }
    }

    #[test]
    fn test_flipping_any_public_key_byte_fails() {
        let req = signed();
        for i in 0..req.public_key.len() {
            let mut tampered = req.clone();
            tampered.public_key[i] ^= 0x01;
            assert!(!verify_request(&tampered), "byte {i} of public key");
        }
    }

    #[test]
    fn test_changed_claim_fails() {
        let mut req = signed();
        req.file_name = "other.pdf".to_string();
        assert!(!verify_request(&req));

        let mut req = signed();
        req.file_hash = hash(b"different document");
        assert!(!verify_request(&req));
    }

    #[test]
    fn test_structurally_malformed_is_false() {
        let mut req = signed();
        req.signature.pop();
        assert!(!verify_request(&req));

        let mut req = signed();
        req.public_key = Vec::new();
        assert!(!verify_request(&req));
    }

    #[test]
    fn test_signed_by_other_key_is_invalid() {
        let owner = StampKeypair::generate();
        let impostor = StampKeypair::generate();
        let mut req = sign_stamp_request(&impostor, hash(b"doc"), "a.pdf");
        req.public_key = owner.public_key().as_bytes().to_vec();
        assert_eq!(
            validate_request(&req),
            Err(ValidationError::InvalidSignature)
        );
    }

    #[test]
    fn test_validate_checks_fields_first() {
        let kp = StampKeypair::generate();
        let req = sign_stamp_request(&kp, hash(b"doc"), "");
        assert_eq!(validate_request(&req), Err(ValidationError::EmptyFileName));
    }
}
