//! Proof codec: the bytes a [`StampRequest`] occupies inside a contract
//! entry's `data` field.
//!
//! The encoding is the same camelCase JSON the client submits, as UTF-8.
//! Anyone reading the ledger with a generic explorer can see the claim
//! without knowing anything about this crate.

use thiserror::Error;

use super::request::StampRequest;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("failed to encode proof: {0}")]
    Encode(String),

    #[error("failed to decode proof: {0}")]
    Decode(String),
}

pub fn encode(request: &StampRequest) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(request).map_err(|e| CodecError::Encode(e.to_string()))
}

pub fn decode(bytes: &[u8]) -> Result<StampRequest, CodecError> {
    serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_FILE_NAME_BYTES;
    use crate::crypto::{hash, StampKeypair};
    use crate::proof::request::sign_stamp_request;

    #[test]
    fn test_roundtrip() {
        let kp = StampKeypair::generate();
        let req = sign_stamp_request(&kp, hash(b"contract.pdf"), "contract.pdf");
        assert_eq!(decode(&encode(&req).unwrap()).unwrap(), req);
    }

    #[test]
    fn test_roundtrip_max_length_multibyte_name() {
        let kp = StampKeypair::generate();
        // 85 three-byte characters = 255 bytes.
        let name = "\u{20AC}".repeat(MAX_FILE_NAME_BYTES / 3);
        assert_eq!(name.len(), MAX_FILE_NAME_BYTES);
        let req = sign_stamp_request(&kp, hash(b"x"), name);
        assert_eq!(decode(&encode(&req).unwrap()).unwrap(), req);
    }

    #[test]
    fn test_roundtrip_preserves_malformed_key_bytes() {
        let kp = StampKeypair::generate();
        let mut req = sign_stamp_request(&kp, hash(b"x"), "a.pdf");
        req.public_key.truncate(7);
        assert_eq!(decode(&encode(&req).unwrap()).unwrap(), req);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode(b"\x00\x01binary"), Err(CodecError::Decode(_))));
        assert!(decode(br#"{"fileHash":"AAAA","fileName":"a"}"#).is_err());
    }
}
