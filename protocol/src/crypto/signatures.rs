//! # Digital Signatures
//!
//! Ed25519 signing and verification, plus the signing contexts that scope a
//! signature to one network and one purpose.
//!
//! ## Signing contexts
//!
//! A bare Ed25519 signature over a transaction encoding says nothing about
//! *which* ledger it was meant for. Anyone holding a devnet transaction could
//! replay it on mainnet, or pass a protocol envelope signature off as a
//! transaction signature. So everything the service signs goes through
//! [`sign_with_context`], which prefixes the message with a short domain tag:
//!
//! ```text
//! "DOCSTAMP" || network_id (u32 LE) || signature_type (u8) || message
//! ```
//!
//! A signature produced under one context never verifies under another.
//!
//! ## Wire-sourced bytes
//!
//! [`verify_raw`] is the entry point for bytes that came off the wire or out
//! of a JSON body. It never errors and never panics: a key of the wrong
//! length, a point that isn't on the curve and a truncated signature are all
//! just `false`. Callers get exactly one failure path.

use ed25519_dalek::{Signature as DalekSignature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::keys::{StampKeypair, StampPublicKey, StampSignature};
use crate::config::{
    NETWORK_ID_DEVNET, NETWORK_ID_MAINNET, SIGNATURE_LENGTH, SIGNING_CONTEXT_TAG,
    NETWORK_ID_TESTNET, VERIFYING_KEY_LENGTH,
};

/// The ledger network a signature is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Mainnet,
    Testnet,
    Devnet,
}

impl NetworkType {
    pub fn network_id(&self) -> u32 {
        match self {
            NetworkType::Mainnet => NETWORK_ID_MAINNET,
            NetworkType::Testnet => NETWORK_ID_TESTNET,
            NetworkType::Devnet => NETWORK_ID_DEVNET,
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkType::Mainnet => write!(f, "mainnet"),
            NetworkType::Testnet => write!(f, "testnet"),
            NetworkType::Devnet => write!(f, "devnet"),
        }
    }
}

impl std::str::FromStr for NetworkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(NetworkType::Mainnet),
            "testnet" => Ok(NetworkType::Testnet),
            "devnet" => Ok(NetworkType::Devnet),
            other => Err(format!("unknown network '{other}'")),
        }
    }
}

/// What a signature is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureType {
    /// A ledger transaction with public entries.
    TransactionPublic,
    /// A ledger transaction with confidential entries. Never produced by
    /// this service, but reserved so the tag space matches the ledger's.
    TransactionConfidential,
    /// A node-to-client RPC envelope.
    ProtocolRpc,
    /// A peer-to-peer envelope between ledger nodes.
    ProtocolPeer,
}

impl SignatureType {
    fn tag(&self) -> u8 {
        match self {
            SignatureType::TransactionPublic => 1,
            SignatureType::TransactionConfidential => 2,
            SignatureType::ProtocolRpc => 3,
            SignatureType::ProtocolPeer => 4,
        }
    }
}

/// A (network, purpose) pair that every signature is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningContext {
    pub network_type: NetworkType,
    pub signature_type: SignatureType,
}

impl SigningContext {
    pub fn new(network_type: NetworkType, signature_type: SignatureType) -> Self {
        Self {
            network_type,
            signature_type,
        }
    }

    /// Context for public ledger transactions on `network`.
    pub fn transaction(network: NetworkType) -> Self {
        Self::new(network, SignatureType::TransactionPublic)
    }

    /// Context for RPC envelopes on `network`.
    pub fn rpc(network: NetworkType) -> Self {
        Self::new(network, SignatureType::ProtocolRpc)
    }

    /// The domain-separation prefix for this context.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(SIGNING_CONTEXT_TAG.len() + 5);
        buf.extend_from_slice(SIGNING_CONTEXT_TAG);
        buf.extend_from_slice(&self.network_type.network_id().to_le_bytes());
        buf.push(self.signature_type.tag());
        buf
    }

    fn bind(&self, message: &[u8]) -> Vec<u8> {
        let mut buf = self.to_bytes();
        buf.extend_from_slice(message);
        buf
    }
}

/// Sign a message with no context. Used for user proofs, where the browser
/// signs the canonical claim bytes directly.
pub fn sign(keypair: &StampKeypair, message: &[u8]) -> StampSignature {
    keypair.sign(message)
}

/// Verify a context-free signature.
pub fn verify(public_key: &StampPublicKey, message: &[u8], signature: &StampSignature) -> bool {
    public_key.verify(message, signature)
}

/// Sign `message` bound to `context`.
pub fn sign_with_context(
    keypair: &StampKeypair,
    context: &SigningContext,
    message: &[u8],
) -> StampSignature {
    keypair.sign(&context.bind(message))
}

/// Verify a signature that was produced by [`sign_with_context`].
pub fn verify_with_context(
    public_key: &StampPublicKey,
    context: &SigningContext,
    message: &[u8],
    signature: &StampSignature,
) -> bool {
    public_key.verify(&context.bind(message), signature)
}

/// Verify a signature given as raw, untrusted byte slices.
///
/// Returns `false` for anything structurally malformed.
pub fn verify_raw(public_key_bytes: &[u8], message: &[u8], signature_bytes: &[u8]) -> bool {
    let Ok(key_bytes) = <[u8; VERIFYING_KEY_LENGTH]>::try_from(public_key_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; SIGNATURE_LENGTH]>::try_from(signature_bytes) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let signature = DalekSignature::from_bytes(&sig_bytes);
    verifying_key.verify(message, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let kp = StampKeypair::generate();
        let sig = sign(&kp, b"hello, ledger");
        assert!(verify(&kp.public_key(), b"hello, ledger", &sig));
        assert!(!verify(&kp.public_key(), b"hello, world", &sig));
    }

    #[test]
    fn test_deterministic_signatures() {
        let kp = StampKeypair::generate();
        assert_eq!(sign(&kp, b"same"), sign(&kp, b"same"));
    }

    #[test]
    fn test_context_roundtrip() {
        let kp = StampKeypair::generate();
        let ctx = SigningContext::transaction(NetworkType::Devnet);
        let sig = sign_with_context(&kp, &ctx, b"tx bytes");
        assert!(verify_with_context(&kp.public_key(), &ctx, b"tx bytes", &sig));
    }

    #[test]
    fn test_context_is_not_plain_signature() {
        let kp = StampKeypair::generate();
        let ctx = SigningContext::transaction(NetworkType::Devnet);
        let sig = sign_with_context(&kp, &ctx, b"tx bytes");
        assert!(!verify(&kp.public_key(), b"tx bytes", &sig));
    }

    #[test]
    fn test_signature_does_not_cross_networks() {
        let kp = StampKeypair::generate();
        let devnet = SigningContext::transaction(NetworkType::Devnet);
        let mainnet = SigningContext::transaction(NetworkType::Mainnet);
        let sig = sign_with_context(&kp, &devnet, b"tx bytes");
        assert!(!verify_with_context(&kp.public_key(), &mainnet, b"tx bytes", &sig));
    }

    #[test]
    fn test_signature_does_not_cross_purposes() {
        let kp = StampKeypair::generate();
        let tx = SigningContext::transaction(NetworkType::Devnet);
        let rpc = SigningContext::rpc(NetworkType::Devnet);
        let sig = sign_with_context(&kp, &tx, b"payload");
        assert!(!verify_with_context(&kp.public_key(), &rpc, b"payload", &sig));
    }

    #[test]
    fn test_context_bytes_layout() {
        let ctx = SigningContext::rpc(NetworkType::Testnet);
        let bytes = ctx.to_bytes();
        assert!(bytes.starts_with(SIGNING_CONTEXT_TAG));
        assert_eq!(bytes.len(), SIGNING_CONTEXT_TAG.len() + 5);
        assert_eq!(*bytes.last().unwrap(), 3);
    }

    #[test]
    fn test_verify_raw_valid() {
        let kp = StampKeypair::generate();
        let sig = sign(&kp, b"raw");
        assert!(verify_raw(kp.public_key().as_bytes(), b"raw", sig.as_bytes()));
    }

    #[test]
    fn test_verify_raw_malformed_is_false() {
        let kp = StampKeypair::generate();
        let sig = sign(&kp, b"raw");
        assert!(!verify_raw(&[0u8; 31], b"raw", sig.as_bytes()));
        assert!(!verify_raw(kp.public_key().as_bytes(), b"raw", &sig.as_bytes()[..63]));
        assert!(!verify_raw(&[], b"raw", &[]));
    }

    #[test]
    fn test_network_from_str() {
        assert_eq!("DevNet".parse::<NetworkType>().unwrap(), NetworkType::Devnet);
        assert!("moonnet".parse::<NetworkType>().is_err());
    }
}
