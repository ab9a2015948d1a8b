//! In-process [`LedgerIndex`]. The mock ledger node records accepted
//! transactions here, and tests read them back through the retriever.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::ledger::{BlockHeader, LedgerError, LedgerIndex, LedgerRecord};
use crate::crypto::StampPublicKey;
use crate::transaction::StampTransaction;

#[derive(Debug, Default)]
pub struct MemoryLedgerIndex {
    records: RwLock<Vec<LedgerRecord>>,
    blocks: RwLock<HashMap<String, BlockHeader>>,
}

impl MemoryLedgerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a transaction, optionally already included in a block.
    pub fn insert(&self, transaction: StampTransaction, block_reference: Option<String>) {
        self.records.write().push(LedgerRecord {
            transaction,
            block_reference,
        });
    }

    pub fn insert_block(&self, header: BlockHeader) {
        self.blocks.write().insert(header.reference.clone(), header);
    }

    /// Moves the transaction with id `transaction_id` into `block`.
    /// Returns `false` if no such transaction is recorded.
    pub fn include_in_block(&self, transaction_id: &str, block: BlockHeader) -> bool {
        let mut records = self.records.write();
        let Some(record) = records
            .iter_mut()
            .find(|r| r.transaction.id().as_deref() == Some(transaction_id))
        else {
            return false;
        };
        record.block_reference = Some(block.reference.clone());
        drop(records);
        self.insert_block(block);
        true
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl LedgerIndex for MemoryLedgerIndex {
    async fn transactions_by_id(
        &self,
        transaction_id: &str,
    ) -> Result<Vec<LedgerRecord>, LedgerError> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| r.transaction.id().as_deref() == Some(transaction_id))
            .cloned()
            .collect())
    }

    async fn transactions_by_public_key(
        &self,
        public_key: &StampPublicKey,
    ) -> Result<Vec<LedgerRecord>, LedgerError> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| {
                r.transaction.sender_public_key() == public_key
                    || r.transaction.receiver_public_key() == public_key
            })
            .cloned()
            .collect())
    }

    async fn block_header(&self, reference: &str) -> Result<Option<BlockHeader>, LedgerError> {
        Ok(self.blocks.read().get(reference).cloned())
    }
}
