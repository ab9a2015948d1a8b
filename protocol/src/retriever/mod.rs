//! # Proof Retriever
//!
//! Turns a transaction id back into a [`StampProof`] using nothing but
//! ledger data, and refuses to return one that doesn't check out.
//!
//! ## Fetch pipeline
//!
//! ```text
//! check id shape → LedgerIndex::transactions_by_id
//!              → verify_transaction (entries + sender signature)
//!              → codec::decode(contract data)
//!              → validate_request (user signature)
//!              → StampProof { nodeProof = sender key + tx signature }
//! ```
//!
//! Inclusion time is resolved separately ([`ProofRetriever::resolve_timestamp`])
//! because it costs another ledger round trip and mempool transactions
//! don't have one yet.

pub mod http;
pub mod ledger;
pub mod memory;

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::SIGNATURE_LENGTH;
use crate::crypto::{from_base32, normalize, StampPublicKey};
use crate::proof::{codec, validate_request, NodeProof, StampProof};
use crate::transaction::verify_transaction;

pub use http::HttpLedgerIndex;
pub use ledger::{BlockHeader, LedgerError, LedgerIndex, LedgerRecord};
pub use memory::MemoryLedgerIndex;

#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("transaction {0} not found")]
    NotFound(String),

    #[error("transaction {transaction_id} does not carry a valid proof: {reason}")]
    InvalidProof {
        transaction_id: String,
        reason: String,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub struct ProofRetriever<L: LedgerIndex> {
    index: Arc<L>,
}

impl<L: LedgerIndex> Clone for ProofRetriever<L> {
    fn clone(&self) -> Self {
        Self {
            index: Arc::clone(&self.index),
        }
    }
}

impl<L: LedgerIndex> ProofRetriever<L> {
    pub fn new(index: Arc<L>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &Arc<L> {
        &self.index
    }

    /// Fetches and verifies the stamp recorded under `transaction_id`.
    /// The id may be in either case.
    pub async fn fetch(&self, transaction_id: &str) -> Result<StampProof, RetrieveError> {
        let (proof, _) = self.locate(transaction_id).await?;
        Ok(proof)
    }

    /// [`fetch`](Self::fetch), then fill in the inclusion time if the
    /// transaction has made it into a block.
    pub async fn fetch_with_timestamp(
        &self,
        transaction_id: &str,
    ) -> Result<StampProof, RetrieveError> {
        let (mut proof, block_reference) = self.locate(transaction_id).await?;
        if let Some(reference) = block_reference {
            proof.timestamp = Some(self.resolve_timestamp(&reference).await?);
        }
        Ok(proof)
    }

    /// Inclusion time of block `block_reference`, in Unix milliseconds.
    pub async fn resolve_timestamp(&self, block_reference: &str) -> Result<u64, RetrieveError> {
        self.index
            .block_header(block_reference)
            .await?
            .map(|header| header.timestamp)
            .ok_or_else(|| RetrieveError::NotFound(block_reference.to_string()))
    }

    /// Every valid stamp sent from `public_key`. Records that fail
    /// verification are skipped.
    pub async fn list_by_public_key(
        &self,
        public_key: &StampPublicKey,
    ) -> Result<Vec<StampProof>, RetrieveError> {
        let records = self.index.transactions_by_public_key(public_key).await?;
        let total = records.len();
        let proofs: Vec<StampProof> = records
            .iter()
            .filter_map(|record| match proof_from_record(record) {
                Ok(proof) => Some(proof),
                Err(e) => {
                    debug!(error = %e, "skipping ledger record");
                    None
                }
            })
            .collect();
        debug!(public_key = %public_key, total, valid = proofs.len(), "listed stamps");
        Ok(proofs)
    }

    async fn locate(
        &self,
        transaction_id: &str,
    ) -> Result<(StampProof, Option<String>), RetrieveError> {
        let id = normalize(transaction_id);
        // Ids are base32 transaction signatures. Anything else can't exist
        // and never reaches the index.
        if !from_base32(&id).is_ok_and(|bytes| bytes.len() == SIGNATURE_LENGTH) {
            debug!(transaction_id = %id, "malformed transaction id");
            return Err(RetrieveError::NotFound(id));
        }
        let record = self
            .index
            .transactions_by_id(&id)
            .await?
            .into_iter()
            .find(|r| r.transaction.id().as_deref() == Some(id.as_str()))
            .ok_or_else(|| RetrieveError::NotFound(id.clone()))?;

        let proof = proof_from_record(&record).map_err(|e| {
            warn!(transaction_id = %id, error = %e, "ledger record failed verification");
            e
        })?;
        Ok((proof, record.block_reference))
    }
}

fn proof_from_record(record: &LedgerRecord) -> Result<StampProof, RetrieveError> {
    let tx = &record.transaction;
    let Some(signed) = &tx.signature else {
        return Err(RetrieveError::InvalidProof {
            transaction_id: String::new(),
            reason: "transaction is unsigned".into(),
        });
    };
    let transaction_id = signed.signature.to_base32();
    let invalid = |reason: String| RetrieveError::InvalidProof {
        transaction_id: transaction_id.clone(),
        reason,
    };

    verify_transaction(tx).map_err(|e| invalid(e.to_string()))?;
    let user_proof = codec::decode(tx.contract_data()).map_err(|e| invalid(e.to_string()))?;
    validate_request(&user_proof).map_err(|e| invalid(e.to_string()))?;

    Ok(StampProof {
        transaction_id: transaction_id.clone(),
        user_proof,
        node_proof: NodeProof {
            public_key: *tx.sender_public_key(),
            signature: signed.signature,
        },
        timestamp: None,
    })
}
