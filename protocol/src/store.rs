//! # Stamp Metadata Store
//!
//! After a stamp is accepted, the service keeps a small record of it so
//! owners can list their stamps with file names attached. The ledger only
//! knows hashes.
//!
//! ## Tree Layout
//!
//! | Tree            | Key                          | Value                 |
//! |-----------------|------------------------------|-----------------------|
//! | `metadata`      | transaction id (UTF-8)       | `json(StampMetadata)` |
//! | `by_public_key` | `public_key \0 transaction_id` | empty               |
//!
//! Values are JSON, not bincode, so the records stay readable with
//! ordinary tooling and match the service's outward format.

use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::crypto::normalize;
use crate::proof::StampProof;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// What the service remembers about one accepted stamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StampMetadata {
    pub transaction_id: String,
    pub file_name: String,
    /// Base32, upper case. The user's key, not the signer's.
    pub public_key: String,
    pub stamp_document_proof: StampProof,
    pub user_id: String,
}

/// Persistence for [`StampMetadata`], keyed by transaction id.
pub trait MetadataStore: Send + Sync {
    /// Inserts or replaces the record for `record.transaction_id`.
    fn put(&self, record: &StampMetadata) -> StoreResult<()>;

    fn get(&self, transaction_id: &str) -> StoreResult<Option<StampMetadata>>;

    fn find_by_public_key(&self, public_key: &str) -> StoreResult<Vec<StampMetadata>>;

    fn find_by_user(&self, user_id: &str) -> StoreResult<Vec<StampMetadata>>;
}

/// [`MetadataStore`] on sled. Cheap to clone; clones share the database.
#[derive(Debug, Clone)]
pub struct SledMetadataStore {
    db: Db,
    metadata: Tree,
    by_public_key: Tree,
}

impl SledMetadataStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::from_db(sled::open(path)?)
    }

    /// In-memory database, removed on drop.
    pub fn open_temporary() -> StoreResult<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let metadata = db.open_tree("metadata")?;
        let by_public_key = db.open_tree("by_public_key")?;
        Ok(Self {
            db,
            metadata,
            by_public_key,
        })
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }
}

fn index_key(public_key: &str, transaction_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(public_key.len() + 1 + transaction_id.len());
    key.extend_from_slice(public_key.as_bytes());
    key.push(0);
    key.extend_from_slice(transaction_id.as_bytes());
    key
}

fn decode(bytes: &[u8]) -> StoreResult<StampMetadata> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

impl MetadataStore for SledMetadataStore {
    fn put(&self, record: &StampMetadata) -> StoreResult<()> {
        let transaction_id = normalize(&record.transaction_id);
        let public_key = normalize(&record.public_key);
        let bytes =
            serde_json::to_vec(record).map_err(|e| StoreError::Serialization(e.to_string()))?;

        // A replaced record may have moved to another key.
        if let Some(previous) = self.metadata.insert(transaction_id.as_bytes(), bytes)? {
            let previous = decode(&previous)?;
            let previous_key = normalize(&previous.public_key);
            if previous_key != public_key {
                self.by_public_key
                    .remove(index_key(&previous_key, &transaction_id))?;
            }
        }
        self.by_public_key
            .insert(index_key(&public_key, &transaction_id), Vec::new())?;
        self.db.flush()?;

        debug!(transaction_id = %transaction_id, "stamp metadata stored");
        Ok(())
    }

    fn get(&self, transaction_id: &str) -> StoreResult<Option<StampMetadata>> {
        self.metadata
            .get(normalize(transaction_id).as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn find_by_public_key(&self, public_key: &str) -> StoreResult<Vec<StampMetadata>> {
        let mut prefix = normalize(public_key).into_bytes();
        prefix.push(0);

        let mut records = Vec::new();
        for entry in self.by_public_key.scan_prefix(&prefix) {
            let (key, _) = entry?;
            if let Some(bytes) = self.metadata.get(&key[prefix.len()..])? {
                records.push(decode(&bytes)?);
            }
        }
        Ok(records)
    }

    fn find_by_user(&self, user_id: &str) -> StoreResult<Vec<StampMetadata>> {
        let mut records = Vec::new();
        for entry in self.metadata.iter() {
            let (_, bytes) = entry?;
            let record = decode(&bytes)?;
            if record.user_id == user_id {
                records.push(record);
            }
        }
        Ok(records)
    }
}
