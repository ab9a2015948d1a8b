//! # Stamp Service
//!
//! The one submission flow, end to end:
//!
//! ```text
//! validate_request ─▶ codec::encode ─▶ build + sign ─▶ connect
//!        │                                               │
//!   ValidationError                          broadcast, await response
//!   (nothing built)                                      │
//!                                 Successful? ─▶ persist metadata ─▶ StampProof
//! ```
//!
//! Once the node has accepted a transaction the stamp exists, so a failure
//! to persist its metadata is logged and the proof is still returned.
//!
//! Plus verification and listing, which only read the ledger.
//!
//! A failed submission is returned to the caller as-is. Whether and when to
//! try again is the caller's decision.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::client::{ClientConfig, Connector, CorrelationClient, TlsConnector};
use crate::config::{ConfigError, ValidatedConfig, DEFAULT_LEDGER_QUERY_TIMEOUT};
use crate::crypto::{to_base32, SigningContext, StampPublicKey};
use crate::error::StampError;
use crate::proof::{codec, validate_request, NodeProof, StampProof, StampRequest, ValidationError};
use crate::retriever::{HttpLedgerIndex, LedgerIndex, ProofRetriever};
use crate::store::{MetadataStore, SledMetadataStore, StampMetadata};
use crate::transaction::{BuildError, StampTransactionBuilder};
use crate::wire::ResponseCode;

// ---------------------------------------------------------------------------
// Outward-facing results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub kind: String,
    pub message: String,
}

/// `{ "success": true, "data": ... }` or `{ "success": false, "error": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResult<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T> ApiResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: &StampError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                kind: error.kind().to_string(),
                message: error.to_string(),
            }),
        }
    }
}

impl<T> From<Result<T, StampError>> for ApiResult<T> {
    fn from(result: Result<T, StampError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(&e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSettings {
    /// The key stamp transactions are signed with. Base32, upper case.
    pub public_key: String,
    pub network: String,
}

/// One entry of [`StampService::list_stamps`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StampSummary {
    pub transaction_id: String,
    pub file_name: String,
    pub stamp_document_proof: StampProof,
    /// Set when this service submitted the stamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

// ---------------------------------------------------------------------------
// StampService
// ---------------------------------------------------------------------------

pub struct StampService<C: Connector, L: LedgerIndex, S: MetadataStore> {
    config: ValidatedConfig,
    client: CorrelationClient<C>,
    retriever: ProofRetriever<L>,
    store: S,
    next_nonce: AtomicU64,
}

/// TLS to the node, HTTP to the ledger index, sled for metadata.
pub type DefaultStampService = StampService<TlsConnector, HttpLedgerIndex, SledMetadataStore>;

impl DefaultStampService {
    /// Needs `node_ca_path` and `metadata_path`.
    pub fn from_config(config: ValidatedConfig) -> Result<Self, StampError> {
        let metadata_path = config
            .metadata_path
            .clone()
            .ok_or(ConfigError::Missing("metadata_path"))?;
        let connector = TlsConnector::from_config(&config)?;
        let ledger = HttpLedgerIndex::new(
            config.ledger_web_address.clone(),
            DEFAULT_LEDGER_QUERY_TIMEOUT,
        )?;
        let store = SledMetadataStore::open(&metadata_path)?;
        Self::new(config, connector, Arc::new(ledger), store)
    }
}

impl<C: Connector, L: LedgerIndex, S: MetadataStore> StampService<C, L, S> {
    pub fn new(
        config: ValidatedConfig,
        connector: C,
        ledger: Arc<L>,
        store: S,
    ) -> Result<Self, StampError> {
        let client = CorrelationClient::new(
            connector,
            config.service_keypair.clone(),
            ClientConfig::from(&config),
        )?;
        Ok(Self {
            config,
            client,
            retriever: ProofRetriever::new(ledger),
            store,
            next_nonce: AtomicU64::new(1),
        })
    }

    pub fn client(&self) -> &CorrelationClient<C> {
        &self.client
    }

    pub fn retriever(&self) -> &ProofRetriever<L> {
        &self.retriever
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stamps `request` on the ledger on behalf of `user_id`.
    pub async fn submit(
        &self,
        request: StampRequest,
        user_id: &str,
    ) -> Result<StampProof, StampError> {
        validate_request(&request)?;
        let receiver = StampPublicKey::try_from_slice(&request.public_key)
            .map_err(|_| ValidationError::InvalidSignature)?;

        let payload = codec::encode(&request).map_err(BuildError::from)?;
        let signer = &self.config.service_keypair;
        let transaction = StampTransactionBuilder::new()
            .receiver(receiver)
            .amount(self.config.amount)
            .fee(self.config.fee)
            .nonce(self.next_nonce.fetch_add(1, Ordering::SeqCst))
            .data(payload)
            .max_data_bytes(self.config.max_contract_data_bytes)
            .sign(signer, &SigningContext::transaction(self.config.network))?;

        let signature = transaction
            .signature
            .as_ref()
            .map(|s| s.signature)
            .ok_or_else(|| BuildError::Encoding("transaction was not signed".into()))?;
        let transaction_id = signature.to_base32();

        self.client.connect().await?;
        info!(
            transaction_id = %transaction_id,
            file_name = %request.file_name,
            "submitting stamp transaction"
        );
        let response_code = self.client.broadcast_transaction(transaction).await?;
        if response_code != ResponseCode::Successful {
            warn!(transaction_id = %transaction_id, %response_code, "stamp rejected by node");
            return Err(StampError::NodeRejected(response_code));
        }

        let proof = StampProof {
            transaction_id: transaction_id.clone(),
            node_proof: NodeProof {
                public_key: signer.public_key(),
                signature,
            },
            user_proof: request,
            timestamp: None,
        };
        let stored = self.store.put(&StampMetadata {
            transaction_id: transaction_id.clone(),
            file_name: proof.user_proof.file_name.clone(),
            public_key: to_base32(&proof.user_proof.public_key),
            stamp_document_proof: proof.clone(),
            user_id: user_id.to_string(),
        });
        if let Err(e) = stored {
            error!(
                transaction_id = %transaction_id,
                user_id,
                error = %e,
                "stamp is on the ledger but its metadata was not saved"
            );
        }

        info!(transaction_id = %transaction_id, "stamp accepted");
        Ok(proof)
    }

    /// Fetches and re-verifies the stamp `transaction_id` from the ledger.
    pub async fn verify(
        &self,
        transaction_id: &str,
        resolve_timestamp: bool,
    ) -> Result<StampProof, StampError> {
        let proof = if resolve_timestamp {
            self.retriever.fetch_with_timestamp(transaction_id).await?
        } else {
            self.retriever.fetch(transaction_id).await?
        };
        Ok(proof)
    }

    /// Every verifiable stamp made for `public_key` (base32, either case).
    pub async fn list_stamps(&self, public_key: &str) -> Result<Vec<StampSummary>, StampError> {
        let owner = StampPublicKey::from_base32(public_key)?;
        let proofs = self.retriever.list_by_public_key(&owner).await?;

        let mut metadata: HashMap<String, StampMetadata> = self
            .store
            .find_by_public_key(&owner.to_base32())?
            .into_iter()
            .map(|record| (record.transaction_id.clone(), record))
            .collect();

        let mut summaries = Vec::with_capacity(proofs.len());
        for proof in proofs {
            if proof.user_proof.public_key.as_slice() != owner.as_bytes() {
                continue;
            }
            let record = metadata.remove(&proof.transaction_id);
            summaries.push(StampSummary {
                transaction_id: proof.transaction_id.clone(),
                file_name: record
                    .as_ref()
                    .map(|m| m.file_name.clone())
                    .unwrap_or_else(|| proof.user_proof.file_name.clone()),
                user_id: record.map(|m| m.user_id),
                stamp_document_proof: proof,
            });
        }
        Ok(summaries)
    }

    /// Stamps this service recorded for `user_id`. Unordered.
    pub fn stamps_for_user(&self, user_id: &str) -> Result<Vec<StampMetadata>, StampError> {
        Ok(self.store.find_by_user(user_id)?)
    }

    pub fn settings(&self) -> ServiceSettings {
        ServiceSettings {
            public_key: self.config.service_keypair.public_key().to_base32(),
            network: self.config.network.to_string(),
        }
    }

    /// Prometheus text exposition of the client metrics.
    pub fn metrics(&self) -> Result<String, StampError> {
        self.client
            .metrics()
            .encode()
            .map_err(|e| StampError::Protocol(e.to_string()))
    }

    /// Closes the node connection. Pending submissions complete as cancelled.
    pub async fn shutdown(&self) {
        self.client.shutdown().await;
    }
}
