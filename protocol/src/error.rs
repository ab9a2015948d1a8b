//! Error types for the stamping service.
//!
//! Every component has its own error enum. [`StampError`] is what the
//! service facade returns. Each component error converts into it, so `?`
//! works across the whole submission and verification flow.

use thiserror::Error;

use crate::client::ClientError;
use crate::config::ConfigError;
use crate::crypto::KeyError;
use crate::proof::ValidationError;
use crate::retriever::{LedgerError, RetrieveError};
use crate::store::StoreError;
use crate::transaction::{BuildError, TransactionError};
use crate::wire::ResponseCode;

#[derive(Debug, Error)]
pub enum StampError {
    /// The request was rejected before any transaction was built.
    #[error("invalid stamp request: {0}")]
    Validation(#[from] ValidationError),

    #[error("could not build stamp transaction: {0}")]
    Build(#[from] BuildError),

    /// A transaction failed its own consistency checks.
    #[error("invalid transaction: {0}")]
    Transaction(#[from] TransactionError),

    #[error("invalid key: {0}")]
    Key(#[from] KeyError),

    #[error("could not reach ledger node: {0}")]
    Connection(String),

    #[error("not connected to ledger node")]
    NotConnected,

    #[error("failed to send to ledger node: {0}")]
    Send(String),

    #[error("timed out waiting for response from node after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("submission was cancelled")]
    Cancelled,

    /// The node answered, but not with `Successful`.
    #[error("ledger node rejected the transaction: {0}")]
    NodeRejected(ResponseCode),

    /// Anything the node said that doesn't fit the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("stamp {0} not found")]
    NotFound(String),

    #[error("invalid proof: {0}")]
    InvalidProof(String),

    #[error("ledger index error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("metadata store error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl StampError {
    /// Stable, machine-readable name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            StampError::Validation(_) => "ValidationError",
            StampError::Build(_) => "BuildError",
            StampError::Transaction(_) => "TransactionError",
            StampError::Key(_) => "KeyError",
            StampError::Connection(_) => "ConnectionError",
            StampError::NotConnected => "NotConnectedError",
            StampError::Send(_) => "SendError",
            StampError::Timeout { .. } => "TimeoutError",
            StampError::Cancelled => "CancelledError",
            StampError::NodeRejected(_) => "NodeRejected",
            StampError::Protocol(_) => "ProtocolError",
            StampError::NotFound(_) => "NotFoundError",
            StampError::InvalidProof(_) => "InvalidProofError",
            StampError::Ledger(_) => "LedgerError",
            StampError::Store(_) => "StoreError",
            StampError::Config(_) => "ConfigError",
        }
    }

    /// Whether the failure happened before anything touched the network.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            StampError::Validation(_)
                | StampError::Build(_)
                | StampError::Key(_)
                | StampError::Config(_)
        )
    }
}

impl From<ClientError> for StampError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Connection(e) => StampError::Connection(e.to_string()),
            ClientError::NotConnected => StampError::NotConnected,
            ClientError::Send(e) => StampError::Send(e.to_string()),
            ClientError::Timeout { timeout_ms, .. } => StampError::Timeout { timeout_ms },
            ClientError::Cancelled { .. } => StampError::Cancelled,
            ClientError::Disconnected => {
                StampError::Connection("connection to ledger node was lost".to_string())
            }
            other @ (ClientError::UnexpectedResponse { .. }
            | ClientError::DuplicateCorrelationId(_)
            | ClientError::Metrics(_)) => StampError::Protocol(other.to_string()),
        }
    }
}

impl From<RetrieveError> for StampError {
    fn from(err: RetrieveError) -> Self {
        match err {
            RetrieveError::NotFound(id) => StampError::NotFound(id),
            invalid @ RetrieveError::InvalidProof { .. } => {
                StampError::InvalidProof(invalid.to_string())
            }
            RetrieveError::Ledger(e) => StampError::Ledger(e),
        }
    }
}
