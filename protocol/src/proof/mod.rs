//! # User Proofs
//!
//! The client-supplied half of a stamp, and the durable record assembled
//! from ledger data.
//!
//! ```text
//! request.rs  - StampRequest, canonical bytes, field limits
//! codec.rs    - StampRequest <-> contract entry bytes
//! verifier.rs - signature gate
//! ```

pub mod codec;
pub mod request;
pub mod verifier;

use serde::{Deserialize, Serialize};

use crate::crypto::{StampPublicKey, StampSignature};

pub use codec::{decode, encode, CodecError};
pub use request::{canonical_bytes, sign_stamp_request, StampRequest, ValidationError};
pub use verifier::{validate_request, verify_request};

/// The ledger node's attestation: the transaction signature and the key
/// that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeProof {
    pub public_key: StampPublicKey,
    pub signature: StampSignature,
}

/// A stamp as it exists on the ledger: the user's claim, the signer's
/// attestation and, once resolved, the block inclusion time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StampProof {
    /// Upper-case base32.
    pub transaction_id: String,
    pub user_proof: StampRequest,
    pub node_proof: NodeProof,
    /// Unix milliseconds. Filled in by `ProofRetriever::resolve_timestamp`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}
