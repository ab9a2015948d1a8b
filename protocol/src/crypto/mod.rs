//! # Cryptographic Primitives
//!
//! Everything the stamping protocol needs from cryptography, and nothing
//! more:
//!
//! - **Ed25519** for user proofs, ledger transactions and protocol envelopes.
//! - **BLAKE3** for document digests.
//! - **Base32** (RFC 4648, unpadded) as the textual form of keys, signatures,
//!   digests and transaction ids.
//!
//! Everything here is a thin, type-safe wrapper around audited
//! implementations.

pub mod encoding;
pub mod hash;
pub mod keys;
pub mod signatures;

pub use encoding::{from_base32, normalize, to_base32, EncodingError};
pub use hash::{hash, hash_reader, Digest};
pub use keys::{KeyError, StampKeypair, StampPublicKey, StampSignature};
pub use signatures::{
    sign, sign_with_context, verify, verify_raw, verify_with_context, NetworkType, SignatureType,
    SigningContext,
};
