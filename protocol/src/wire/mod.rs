//! # Node Wire Protocol
//!
//! Messages exchanged with the ledger node over its RPC connection.
//!
//! Every message is a [`ProtocolMessage`] envelope: a correlation id, the
//! sender's public key, a [`MessageBody`] and an Ed25519 signature over
//! `(version, correlation_id, body)` under the network's `ProtocolRpc`
//! signing context. Envelopes are bincode-encoded and shipped in frames, see
//! [`frame`].
//!
//! The node echoes the correlation id of a request in its response. That id
//! is the only thing tying a response to the call that is waiting for it.

pub mod frame;

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::config::WIRE_PROTOCOL_VERSION;
use crate::crypto::{
    sign_with_context, verify_with_context, NetworkType, SigningContext, StampKeypair,
    StampPublicKey, StampSignature,
};
use crate::transaction::StampTransaction;

pub use frame::{read_frame, write_frame, WireError};

// ---------------------------------------------------------------------------
// CorrelationId
// ---------------------------------------------------------------------------

/// Random (v4) UUID linking a request to its response.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for CorrelationId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CorrelationId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Message bodies
// ---------------------------------------------------------------------------

/// Outcome reported by the node for a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseCode {
    Successful,
    Error,
    Failed,
    /// The node already has this transaction.
    Exists,
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseCode::Successful => write!(f, "Successful"),
            ResponseCode::Error => write!(f, "Error"),
            ResponseCode::Failed => write!(f, "Failed"),
            ResponseCode::Exists => write!(f, "Exists"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageBody {
    BroadcastTransactionRequest { transaction: StampTransaction },
    BroadcastTransactionResponse { response_code: ResponseCode },
}

impl MessageBody {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            MessageBody::BroadcastTransactionRequest { .. } => "BroadcastTransactionRequest",
            MessageBody::BroadcastTransactionResponse { .. } => "BroadcastTransactionResponse",
        }
    }
}

// ---------------------------------------------------------------------------
// ProtocolMessage
// ---------------------------------------------------------------------------

/// A signed envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolMessage {
    pub version: u16,
    pub correlation_id: CorrelationId,
    pub sender: StampPublicKey,
    pub body: MessageBody,
    pub signature: StampSignature,
}

impl ProtocolMessage {
    /// Wraps `body` in an envelope signed by `keypair`.
    pub fn sign(
        body: MessageBody,
        correlation_id: CorrelationId,
        keypair: &StampKeypair,
        network: NetworkType,
    ) -> Result<Self, WireError> {
        let signable = signable_bytes(WIRE_PROTOCOL_VERSION, &correlation_id, &body)?;
        let signature = sign_with_context(keypair, &SigningContext::rpc(network), &signable);
        Ok(Self {
            version: WIRE_PROTOCOL_VERSION,
            correlation_id,
            sender: keypair.public_key(),
            body,
            signature,
        })
    }

    /// `true` iff the envelope was signed by `expected_sender` for `network`.
    pub fn verify(&self, expected_sender: &StampPublicKey, network: NetworkType) -> bool {
        if &self.sender != expected_sender {
            return false;
        }
        let Ok(signable) = signable_bytes(self.version, &self.correlation_id, &self.body) else {
            return false;
        };
        verify_with_context(
            &self.sender,
            &SigningContext::rpc(network),
            &signable,
            &self.signature,
        )
    }
}

fn signable_bytes(
    version: u16,
    correlation_id: &CorrelationId,
    body: &MessageBody,
) -> Result<Vec<u8>, WireError> {
    bincode::serialize(&(version, correlation_id, body))
        .map_err(|e| WireError::Encoding(e.to_string()))
}
