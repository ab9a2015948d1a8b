//! # Protocol Configuration & Constants
//!
//! Every magic number in the stamping service lives here, alongside the
//! runtime configuration structure.
//!
//! Runtime configuration is read once, by the binary, and validated once via
//! [`StampConfig::validate`]. Protocol components take the resulting
//! [`ValidatedConfig`] (or pieces of it) in their constructors and never go
//! looking at the process environment themselves.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::crypto::{KeyError, NetworkType, StampKeypair, StampPublicKey};

// ---------------------------------------------------------------------------
// Network Identifiers
// ---------------------------------------------------------------------------

/// Mainnet. Stamps recorded here are the ones anyone will actually check.
pub const NETWORK_ID_MAINNET: u32 = 0x4453_544D; // "DSTM"

/// Testnet.
pub const NETWORK_ID_TESTNET: u32 = 0x4453_5454; // "DSTT"

/// Devnet. Reset whenever the ledger team feels like it.
pub const NETWORK_ID_DEVNET: u32 = 0x4453_5444; // "DSTD"

/// Prefix of every signing context. See `crypto::signatures`.
pub const SIGNING_CONTEXT_TAG: &[u8] = b"DOCSTAMP";

// ---------------------------------------------------------------------------
// Wire Protocol
// ---------------------------------------------------------------------------

/// Every frame on the node connection starts with these 4 bytes so either
/// side can reject foreign traffic without parsing further.
pub const PROTOCOL_MAGIC: u32 = 0x4453_5450; // "DSTP"

/// Version of the envelope encoding. Bump on any incompatible change to
/// `wire::ProtocolMessage`.
pub const WIRE_PROTOCOL_VERSION: u16 = 1;

/// Largest frame body either side will accept. A maximal contract payload
/// plus envelope overhead fits comfortably.
pub const MAX_FRAME_BYTES: usize = 256 * 1024;

/// Default RPC port of a ledger node.
pub const DEFAULT_NODE_RPC_PORT: u16 = 42066;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Ed25519 secret key length in bytes.
pub const SIGNING_KEY_LENGTH: usize = 32;

/// Public (verifying) key length in bytes.
pub const VERIFYING_KEY_LENGTH: usize = 32;

/// Ed25519 signature length. Always 64 bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// BLAKE3 output length in bytes.
pub const HASH_OUTPUT_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Transaction Limits
// ---------------------------------------------------------------------------

/// Largest contract-entry payload the ledger node accepts.
pub const MAX_CONTRACT_DATA_BYTES: usize = 32 * 1024;

/// Longest file name a proof may carry, in UTF-8 bytes.
pub const MAX_FILE_NAME_BYTES: usize = 255;

/// Amount transferred by a stamp transaction. Stamps move a token amount
/// to the receiver so the public entry is non-empty.
pub const DEFAULT_STAMP_AMOUNT: u64 = 1;

/// Fee attached to a stamp transaction.
pub const DEFAULT_STAMP_FEE: u64 = 1;

// ---------------------------------------------------------------------------
// Timing Constants
// ---------------------------------------------------------------------------

/// How long a submission waits for the node's acknowledgement.
pub const DEFAULT_SUBMISSION_TIMEOUT: Duration = Duration::from_secs(10);

/// How often the dispatch task sweeps the pending table for overdue entries.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Connection establishment timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for ledger index HTTP queries.
pub const DEFAULT_LEDGER_QUERY_TIMEOUT: Duration = Duration::from_secs(15);

// ---------------------------------------------------------------------------
// Runtime Configuration
// ---------------------------------------------------------------------------

/// Errors found while validating a [`StampConfig`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid node public key: {0}")]
    NodePublicKey(KeyError),

    #[error("invalid service secret key: {0}")]
    ServiceKey(KeyError),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Raw, serde-deserializable configuration. Field values are whatever the
/// operator typed; nothing here has been checked yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "snake_case")]
pub struct StampConfig {
    /// `host:port` of the ledger node's RPC endpoint.
    pub node_address: String,
    /// The node's public key, base32. Inbound envelopes not signed by this
    /// key are dropped.
    pub node_public_key: String,
    /// PEM bundle the node's TLS certificate must chain to. Listing the
    /// node's own self-signed certificate pins it.
    pub node_ca_path: Option<PathBuf>,
    /// Name checked against the node's certificate. Defaults to the host
    /// part of `node_address`.
    pub node_server_name: Option<String>,
    /// The service signer's secret key, base32.
    pub service_secret_key: String,
    pub network: NetworkType,
    /// Base URL of the ledger's web index, e.g. `http://localhost:5005`.
    pub ledger_web_address: String,
    pub submission_timeout_ms: u64,
    pub sweep_interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub amount: u64,
    pub fee: u64,
    pub max_contract_data_bytes: usize,
    /// Directory of the sled metadata store. The networked service refuses
    /// to start without one.
    pub metadata_path: Option<PathBuf>,
}

impl Default for StampConfig {
    fn default() -> Self {
        Self {
            node_address: format!("127.0.0.1:{DEFAULT_NODE_RPC_PORT}"),
            node_public_key: String::new(),
            node_ca_path: None,
            node_server_name: None,
            service_secret_key: String::new(),
            network: NetworkType::Devnet,
            ledger_web_address: "http://127.0.0.1:5005".to_string(),
            submission_timeout_ms: DEFAULT_SUBMISSION_TIMEOUT.as_millis() as u64,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL.as_millis() as u64,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            amount: DEFAULT_STAMP_AMOUNT,
            fee: DEFAULT_STAMP_FEE,
            max_contract_data_bytes: MAX_CONTRACT_DATA_BYTES,
            metadata_path: None,
        }
    }
}

/// Configuration after validation. Keys are parsed, durations are typed and
/// limits are known to be sane.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub node_address: String,
    pub node_public_key: StampPublicKey,
    pub node_ca_path: Option<PathBuf>,
    pub node_server_name: String,
    pub service_keypair: StampKeypair,
    pub network: NetworkType,
    pub ledger_web_address: String,
    pub submission_timeout: Duration,
    pub sweep_interval: Duration,
    pub connect_timeout: Duration,
    pub amount: u64,
    pub fee: u64,
    pub max_contract_data_bytes: usize,
    pub metadata_path: Option<PathBuf>,
}

impl StampConfig {
    /// Check every field once. The only way to obtain a [`ValidatedConfig`].
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        let node_address = self.node_address.trim();
        if node_address.is_empty() {
            return Err(ConfigError::Missing("node_address"));
        }
        if !node_address.contains(':') {
            return Err(ConfigError::Invalid {
                field: "node_address",
                reason: format!("expected host:port, got '{node_address}'"),
            });
        }

        let node_server_name = match self.node_server_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => host_of(node_address).to_string(),
        };
        if node_server_name.is_empty() {
            return Err(ConfigError::Invalid {
                field: "node_server_name",
                reason: format!("cannot derive a host from '{node_address}'"),
            });
        }

        if self.node_public_key.trim().is_empty() {
            return Err(ConfigError::Missing("node_public_key"));
        }
        let node_public_key = StampPublicKey::from_base32(&self.node_public_key)
            .map_err(ConfigError::NodePublicKey)?;

        if self.service_secret_key.trim().is_empty() {
            return Err(ConfigError::Missing("service_secret_key"));
        }
        let service_keypair = StampKeypair::from_base32(&self.service_secret_key)
            .map_err(ConfigError::ServiceKey)?;

        let ledger_web_address = self.ledger_web_address.trim().trim_end_matches('/');
        if !(ledger_web_address.starts_with("http://")
            || ledger_web_address.starts_with("https://"))
        {
            return Err(ConfigError::Invalid {
                field: "ledger_web_address",
                reason: "must be an http(s) URL".to_string(),
            });
        }

        for (field, value) in [
            ("submission_timeout_ms", self.submission_timeout_ms),
            ("sweep_interval_ms", self.sweep_interval_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        if self.max_contract_data_bytes == 0 || self.max_contract_data_bytes > MAX_CONTRACT_DATA_BYTES
        {
            return Err(ConfigError::Invalid {
                field: "max_contract_data_bytes",
                reason: format!("must be between 1 and {MAX_CONTRACT_DATA_BYTES}"),
            });
        }

        Ok(ValidatedConfig {
            node_address: node_address.to_string(),
            node_public_key,
            node_ca_path: self.node_ca_path.clone(),
            node_server_name,
            service_keypair,
            network: self.network,
            ledger_web_address: ledger_web_address.to_string(),
            submission_timeout: Duration::from_millis(self.submission_timeout_ms),
            sweep_interval: Duration::from_millis(self.sweep_interval_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            amount: self.amount,
            fee: self.fee,
            max_contract_data_bytes: self.max_contract_data_bytes,
            metadata_path: self.metadata_path.clone(),
        })
    }
}

/// Host part of `host:port`, without IPv6 brackets.
fn host_of(address: &str) -> &str {
    let host = address.rsplit_once(':').map_or(address, |(host, _)| host);
    host.trim_start_matches('[').trim_end_matches(']')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> StampConfig {
        StampConfig {
            node_public_key: StampKeypair::generate().public_key().to_base32(),
            service_secret_key: StampKeypair::generate().secret_key_base32(),
            ..StampConfig::default()
        }
    }

    #[test]
    fn test_network_ids_are_distinct() {
        assert_ne!(NETWORK_ID_MAINNET, NETWORK_ID_TESTNET);
        assert_ne!(NETWORK_ID_MAINNET, NETWORK_ID_DEVNET);
        assert_ne!(NETWORK_ID_TESTNET, NETWORK_ID_DEVNET);
    }

    #[test]
    fn test_protocol_magic_is_valid_ascii() {
        let bytes = PROTOCOL_MAGIC.to_be_bytes();
        assert!(bytes.iter().all(|b| b.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_limits_sanity() {
        assert!(MAX_CONTRACT_DATA_BYTES < MAX_FRAME_BYTES);
        assert!(MAX_FILE_NAME_BYTES < MAX_CONTRACT_DATA_BYTES);
        assert!(DEFAULT_SWEEP_INTERVAL < DEFAULT_SUBMISSION_TIMEOUT);
    }

    #[test]
    fn test_default_timeout_is_ten_seconds() {
        assert_eq!(StampConfig::default().submission_timeout_ms, 10_000);
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        let cfg = valid_config();
        let validated = cfg.validate().unwrap();
        assert_eq!(validated.submission_timeout, DEFAULT_SUBMISSION_TIMEOUT);
        assert_eq!(validated.network, NetworkType::Devnet);
        assert_eq!(
            validated.node_public_key.to_base32(),
            cfg.node_public_key
        );
    }

    #[test]
    fn test_server_name_defaults_to_node_host() {
        let cfg = StampConfig {
            node_address: "node.ledger.example:42066".to_string(),
            ..valid_config()
        };
        assert_eq!(cfg.validate().unwrap().node_server_name, "node.ledger.example");

        let cfg = StampConfig {
            node_address: "[::1]:42066".to_string(),
            ..valid_config()
        };
        assert_eq!(cfg.validate().unwrap().node_server_name, "::1");

        let cfg = StampConfig {
            node_address: "10.0.0.5:42066".to_string(),
            node_server_name: Some(" node.internal ".to_string()),
            ..valid_config()
        };
        assert_eq!(cfg.validate().unwrap().node_server_name, "node.internal");
    }

    #[test]
    fn test_validate_rejects_empty_host() {
        let cfg = StampConfig {
            node_address: ":42066".to_string(),
            ..valid_config()
        };
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::Invalid {
                field: "node_server_name",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_requires_keys() {
        let cfg = StampConfig {
            node_public_key: String::new(),
            ..valid_config()
        };
        assert_eq!(cfg.validate().unwrap_err(), ConfigError::Missing("node_public_key"));

        let cfg = StampConfig {
            service_secret_key: String::new(),
            ..valid_config()
        };
        assert_eq!(
            cfg.validate().unwrap_err(),
            ConfigError::Missing("service_secret_key")
        );
    }

    #[test]
    fn test_validate_rejects_bad_key_encoding() {
        let cfg = StampConfig {
            node_public_key: "not a key!".to_string(),
            ..valid_config()
        };
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::NodePublicKey(_)
        ));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let cfg = StampConfig {
            submission_timeout_ms: 0,
            ..valid_config()
        };
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::Invalid {
                field: "submission_timeout_ms",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_caps_contract_data() {
        let cfg = StampConfig {
            max_contract_data_bytes: MAX_CONTRACT_DATA_BYTES + 1,
            ..valid_config()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_trims_trailing_slash() {
        let cfg = StampConfig {
            ledger_web_address: "https://ledger.example/".to_string(),
            ..valid_config()
        };
        assert_eq!(
            cfg.validate().unwrap().ledger_web_address,
            "https://ledger.example"
        );
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let cfg: StampConfig =
            serde_json::from_str(r#"{"node_address":"10.0.0.1:42066","network":"testnet"}"#)
                .unwrap();
        assert_eq!(cfg.node_address, "10.0.0.1:42066");
        assert_eq!(cfg.network, NetworkType::Testnet);
        assert_eq!(cfg.fee, DEFAULT_STAMP_FEE);
    }
}
