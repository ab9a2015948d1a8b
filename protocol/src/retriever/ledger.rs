//! The ledger's query side, as the retriever sees it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::StampPublicKey;
use crate::transaction::StampTransaction;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger request failed: {0}")]
    Http(String),

    #[error("ledger returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("failed to decode ledger response: {0}")]
    Decode(String),
}

/// A transaction as recorded by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    pub transaction: StampTransaction,
    /// The block that includes the transaction. `None` while it is still in
    /// the mempool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    pub reference: String,
    /// Unix milliseconds.
    pub timestamp: u64,
}

/// Lookup operations against the ledger's index.
///
/// Absence is not an error: an unknown id yields an empty list, an unknown
/// block yields `None`.
#[async_trait]
pub trait LedgerIndex: Send + Sync {
    /// Records whose transaction id matches `transaction_id`. The id is
    /// already normalized to upper case.
    async fn transactions_by_id(&self, transaction_id: &str)
        -> Result<Vec<LedgerRecord>, LedgerError>;

    /// Records that `public_key` sent or received.
    async fn transactions_by_public_key(
        &self,
        public_key: &StampPublicKey,
    ) -> Result<Vec<LedgerRecord>, LedgerError>;

    async fn block_header(&self, reference: &str) -> Result<Option<BlockHeader>, LedgerError>;
}
