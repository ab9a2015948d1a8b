//! # Key Management
//!
//! Ed25519 keypairs, public keys and signatures for the stamping service.
//!
//! Two kinds of key show up in every stamp:
//!
//! - the **user key**, which signs the document claim in the browser and is
//!   only ever seen here as a public key plus a signature;
//! - the **service key**, which signs ledger transactions and protocol
//!   envelopes. Its public half is what verifiers compare a `nodeProof`
//!   against.
//!
//! Both are plain Ed25519. Keys are exchanged as upper-case base32.
//!
//! ## Security considerations
//!
//! - Secret keys are zeroized on drop (ed25519-dalek does this for us).
//! - Key generation uses `OsRng`.
//! - Secret bytes never appear in `Debug` output or logs.

use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

use super::encoding::{from_base32, to_base32};
use crate::config::{SIGNATURE_LENGTH, VERIFYING_KEY_LENGTH};

/// Errors that can occur during key operations.
///
/// Deliberately vague about *why* key material was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid secret key bytes")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,

    #[error("invalid signature bytes: expected 64 bytes")]
    InvalidSignature,

    #[error("invalid key encoding: {0}")]
    InvalidEncoding(String),
}

/// An Ed25519 keypair held by the stamping service.
///
/// `StampKeypair` intentionally does NOT implement `Serialize`. Exporting a
/// secret key has to go through [`StampKeypair::secret_key_base32`].
pub struct StampKeypair {
    signing_key: SigningKey,
}

/// The public half of a keypair. Serializes as a base32 string.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct StampPublicKey {
    bytes: [u8; 32],
}

/// An Ed25519 signature. Serializes as a base32 string.
///
/// Construction always checks for 64 bytes, so holders can rely on the
/// length.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct StampSignature {
    bytes: [u8; 64],
}

impl StampKeypair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic keypair from a 32-byte seed. In Ed25519 the seed *is*
    /// the secret key.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Reconstruct a keypair from a secret key slice.
    pub fn from_secret_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let seed: [u8; SECRET_KEY_LENGTH] =
            bytes.try_into().map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    /// Reconstruct a keypair from a base32-encoded secret key, the format
    /// used in configuration files.
    pub fn from_base32(encoded: &str) -> Result<Self, KeyError> {
        let bytes = from_base32(encoded).map_err(|e| KeyError::InvalidEncoding(e.to_string()))?;
        Self::from_secret_slice(&bytes)
    }

    /// Export the secret key as base32. Handle with care.
    pub fn secret_key_base32(&self) -> String {
        to_base32(&self.signing_key.to_bytes())
    }

    /// Returns the public key associated with this keypair.
    pub fn public_key(&self) -> StampPublicKey {
        StampPublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Sign a message. Ed25519 signatures are deterministic.
    pub fn sign(&self, message: &[u8]) -> StampSignature {
        StampSignature {
            bytes: self.signing_key.sign(message).to_bytes(),
        }
    }

    /// Convenience for `self.public_key().verify(..)`.
    pub fn verify(&self, message: &[u8], signature: &StampSignature) -> bool {
        self.public_key().verify(message, signature)
    }
}

impl Clone for StampKeypair {
    fn clone(&self) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&self.signing_key.to_bytes()),
        }
    }
}

impl fmt::Debug for StampKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StampKeypair(pub={})", self.public_key())
    }
}

// ---------------------------------------------------------------------------
// StampPublicKey
// ---------------------------------------------------------------------------

impl StampPublicKey {
    /// Wrap raw bytes without point validation. Verification will simply
    /// fail later if the bytes are not a valid point.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Length-checked and point-validated construction.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; VERIFYING_KEY_LENGTH] =
            slice.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    /// Parse a base32 public key (either case).
    pub fn from_base32(encoded: &str) -> Result<Self, KeyError> {
        let bytes = from_base32(encoded).map_err(|e| KeyError::InvalidEncoding(e.to_string()))?;
        Self::try_from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Upper-case base32, the canonical display form.
    pub fn to_base32(&self) -> String {
        to_base32(&self.bytes)
    }

    /// Returns `true` iff `signature` is a valid Ed25519 signature over
    /// `message` by this key. Never panics.
    pub fn verify(&self, message: &[u8], signature: &StampSignature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let dalek_sig = DalekSignature::from_bytes(&signature.bytes);
        verifying_key.verify(message, &dalek_sig).is_ok()
    }
}

impl Hash for StampPublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Display for StampPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base32())
    }
}

impl fmt::Debug for StampPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StampPublicKey({})", &self.to_base32()[..12])
    }
}

impl Serialize for StampPublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base32())
    }
}

impl<'de> Deserialize<'de> for StampPublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = from_base32(&s).map_err(de::Error::custom)?;
        let bytes: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| de::Error::custom("public key must be 32 bytes"))?;
        Ok(Self { bytes })
    }
}

// ---------------------------------------------------------------------------
// StampSignature
// ---------------------------------------------------------------------------

impl StampSignature {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self { bytes }
    }

    /// Length-checked construction from an arbitrary slice.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; SIGNATURE_LENGTH] =
            slice.try_into().map_err(|_| KeyError::InvalidSignature)?;
        Ok(Self { bytes })
    }

    pub fn from_base32(encoded: &str) -> Result<Self, KeyError> {
        let bytes = from_base32(encoded).map_err(|e| KeyError::InvalidEncoding(e.to_string()))?;
        Self::try_from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }

    pub fn to_base32(&self) -> String {
        to_base32(&self.bytes)
    }
}

impl fmt::Display for StampSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base32())
    }
}

impl fmt::Debug for StampSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = self.to_base32();
        write!(
            f,
            "StampSignature({}...{})",
            &encoded[..8],
            &encoded[encoded.len() - 8..]
        )
    }
}

impl Serialize for StampSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base32())
    }
}

impl<'de> Deserialize<'de> for StampSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_base32(&s).map_err(de::Error::custom)
    }
}
