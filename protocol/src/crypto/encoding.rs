//! # Base32 Encoding
//!
//! Keys, signatures, digests and transaction ids all travel as RFC 4648
//! base32 without padding. The ledger and its web index use lower case in
//! some places and upper case in others, so decoding is case-insensitive and
//! everything we *emit* is upper case. One canonical form means transaction
//! ids can be compared as plain strings after [`normalize`].

use data_encoding::BASE32_NOPAD;
use thiserror::Error;

/// Failure to decode a base32 string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid base32 input: {0}")]
pub struct EncodingError(pub String);

/// Encodes bytes as upper-case, unpadded base32.
pub fn to_base32(bytes: &[u8]) -> String {
    BASE32_NOPAD.encode(bytes)
}

/// Decodes unpadded base32 in either case.
///
/// Surrounding whitespace is ignored. Trailing `=` padding is tolerated
/// because some clients still emit it.
pub fn from_base32(input: &str) -> Result<Vec<u8>, EncodingError> {
    let canonical = normalize(input);
    BASE32_NOPAD
        .decode(canonical.trim_end_matches('=').as_bytes())
        .map_err(|e| EncodingError(e.to_string()))
}

/// Canonical textual form of a base32 identifier: trimmed, upper case.
pub fn normalize(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

/// Serde adapter for `Vec<u8>` fields that are base32 strings on the wire.
///
/// Use with `#[serde(with = "crate::crypto::encoding::base32_bytes")]`.
pub mod base32_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_base32(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::from_base32(&s).map_err(de::Error::custom)
    }
}
