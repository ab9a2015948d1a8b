//! # Stamp Requests
//!
//! The user proof: a claim that the holder of `publicKey` had a document with
//! digest `fileHash` and name `fileName`, authenticated by `signature`.
//!
//! ## Canonical bytes
//!
//! The signature covers a fixed byte layout, never the JSON:
//!
//! ```text
//! file_hash (32 bytes) || file_name_len (u32 LE) || file_name (UTF-8)
//! ```
//!
//! The length prefix stops a hash/name boundary from being shifted, so two
//! different claims can never share the same signed bytes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{HASH_OUTPUT_LENGTH, MAX_FILE_NAME_BYTES};
use crate::crypto::encoding::base32_bytes;
use crate::crypto::{Digest, StampKeypair};

/// Why a request was turned away before it reached the ledger.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("file name is empty")]
    EmptyFileName,

    #[error("file name is {len} bytes, max is {max}")]
    FileNameTooLong { len: usize, max: usize },

    #[error("signature does not verify for the supplied public key")]
    InvalidSignature,

    #[error("malformed request: {0}")]
    Malformed(String),
}

/// A client's stamp request, exactly as it appears on the wire and inside a
/// contract entry.
///
/// `signature` and `public_key` stay as raw bytes rather than typed keys:
/// a request with a 31-byte key is still a request, it just never verifies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StampRequest {
    pub file_hash: Digest,
    #[serde(with = "base32_bytes")]
    pub signature: Vec<u8>,
    #[serde(with = "base32_bytes")]
    pub public_key: Vec<u8>,
    pub file_name: String,
}

impl StampRequest {
    /// The bytes the user signed.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        canonical_bytes(&self.file_hash, &self.file_name)
    }

    /// Checks that the claimed fields are within limits. Signature checking
    /// is the verifier's job; see [`super::verifier::validate_request`].
    pub fn check_fields(&self) -> Result<(), ValidationError> {
        if self.file_name.trim().is_empty() {
            return Err(ValidationError::EmptyFileName);
        }
        let len = self.file_name.len();
        if len > MAX_FILE_NAME_BYTES {
            return Err(ValidationError::FileNameTooLong {
                len,
                max: MAX_FILE_NAME_BYTES,
            });
        }
        Ok(())
    }
}

/// Canonical encoding of `(file_hash, file_name)`.
pub fn canonical_bytes(file_hash: &Digest, file_name: &str) -> Vec<u8> {
    let name = file_name.as_bytes();
    let mut buf = Vec::with_capacity(HASH_OUTPUT_LENGTH + 4 + name.len());
    buf.extend_from_slice(file_hash.as_bytes());
    buf.extend_from_slice(&(name.len() as u32).to_le_bytes());
    buf.extend_from_slice(name);
    buf
}

/// Produce a signed request, the way a client would before submitting.
pub fn sign_stamp_request(
    keypair: &StampKeypair,
    file_hash: Digest,
    file_name: impl Into<String>,
) -> StampRequest {
    let file_name = file_name.into();
    let signature = keypair.sign(&canonical_bytes(&file_hash, &file_name));
    StampRequest {
        file_hash,
        signature: signature.as_bytes().to_vec(),
        public_key: keypair.public_key().as_bytes().to_vec(),
        file_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash;

    #[test]
    fn test_canonical_bytes_layout() {
        let digest = hash(b"contents");
        let bytes = canonical_bytes(&digest, "a.pdf");
        assert_eq!(&bytes[..32], digest.as_bytes());
        assert_eq!(&bytes[32..36], &5u32.to_le_bytes());
        assert_eq!(&bytes[36..], b"a.pdf");
    }

    #[test]
    fn test_canonical_bytes_are_unambiguous() {
        let digest = hash(b"contents");
        assert_ne!(canonical_bytes(&digest, "ab"), canonical_bytes(&digest, "a"));
    }

    #[test]
    fn test_sign_stamp_request_fills_fields() {
        let kp = StampKeypair::generate();
        let digest = hash(b"contents");
        let req = sign_stamp_request(&kp, digest, "a.pdf");
        assert_eq!(req.file_hash, digest);
        assert_eq!(req.public_key, kp.public_key().as_bytes().to_vec());
        assert_eq!(req.signature.len(), 64);
    }

    #[test]
    fn test_json_field_names() {
        let kp = StampKeypair::generate();
        let req = sign_stamp_request(&kp, hash(b"x"), "a.pdf");
        let value = serde_json::to_value(&req).unwrap();
        for field in ["fileHash", "signature", "publicKey", "fileName"] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        assert_eq!(value["publicKey"], kp.public_key().to_base32());
    }

    #[test]
    fn test_check_fields() {
        let kp = StampKeypair::generate();
        let ok = sign_stamp_request(&kp, hash(b"x"), "a.pdf");
        assert!(ok.check_fields().is_ok());

        let empty = sign_stamp_request(&kp, hash(b"x"), "  ");
        assert_eq!(empty.check_fields(), Err(ValidationError::EmptyFileName));

        let long = sign_stamp_request(&kp, hash(b"x"), "n".repeat(MAX_FILE_NAME_BYTES + 1));
        assert!(matches!(
            long.check_fields(),
            Err(ValidationError::FileNameTooLong { .. })
        ));

        let max = sign_stamp_request(&kp, hash(b"x"), "n".repeat(MAX_FILE_NAME_BYTES));
        assert!(max.check_fields().is_ok());
    }
}
