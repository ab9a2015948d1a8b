//! # Hashing Utilities
//!
//! Document digests. A stamp never contains the document itself, only its
//! 32-byte BLAKE3 digest, computed client-side before signing.
//!
//! BLAKE3 is fast enough that hashing a multi-hundred-megabyte PDF is bounded
//! by disk, not CPU, which matters for [`hash_reader`] in the CLI.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::io::{self, Read};

use super::encoding::{from_base32, to_base32};
use crate::config::HASH_OUTPUT_LENGTH;

/// A 32-byte document digest. Serializes as upper-case base32.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; HASH_OUTPUT_LENGTH]);

impl Digest {
    pub fn from_bytes(bytes: [u8; HASH_OUTPUT_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Length-checked construction. `None` if `slice` isn't 32 bytes.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        slice.try_into().ok().map(Self)
    }

    pub fn from_base32(encoded: &str) -> Option<Self> {
        from_base32(encoded)
            .ok()
            .and_then(|bytes| Self::from_slice(&bytes))
    }

    pub fn as_bytes(&self) -> &[u8; HASH_OUTPUT_LENGTH] {
        &self.0
    }

    pub fn to_base32(&self) -> String {
        to_base32(&self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base32())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_base32())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base32())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = from_base32(&s).map_err(de::Error::custom)?;
        Self::from_slice(&bytes).ok_or_else(|| {
            de::Error::custom(format!(
                "digest must be {HASH_OUTPUT_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })
    }
}

/// BLAKE3 digest of an in-memory buffer.
pub fn hash(data: &[u8]) -> Digest {
    Digest(*blake3::hash(data).as_bytes())
}

/// BLAKE3 digest of everything `reader` yields, streamed.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<Digest> {
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(Digest(*hasher.finalize().as_bytes()))
}
