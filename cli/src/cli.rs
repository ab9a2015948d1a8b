//! # CLI Interface
//!
//! Command-line structure for `docstamp`, via `clap` derive.
//!
//! `keygen` and `sign` run entirely on the client side. `submit`, `verify`,
//! `list` and `settings` talk to the ledger and need a configuration.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// DocStamp: proof of existence for documents, recorded on a ledger.
#[derive(Parser, Debug)]
#[command(
    name = "docstamp",
    about = "Stamp documents on a ledger and verify stamps",
    version,
    propagate_version = true
)]
pub struct DocStampCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand. Each setting here overrides the
/// same field of the configuration file.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Configuration file (TOML).
    #[arg(long, short = 'c', env = "DOCSTAMP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// `host:port` of the ledger node.
    #[arg(long, env = "DOCSTAMP_NODE_ADDRESS", global = true)]
    pub node_address: Option<String>,

    /// The ledger node's public key, base32.
    #[arg(long, env = "DOCSTAMP_NODE_PUBLIC_KEY", global = true)]
    pub node_public_key: Option<String>,

    /// PEM file with the CA (or the node's own certificate) to trust for
    /// the node's TLS endpoint.
    #[arg(long, env = "DOCSTAMP_NODE_CA_PATH", global = true)]
    pub node_ca_path: Option<PathBuf>,

    /// Name to check the node's certificate against, if it differs from
    /// the host in `--node-address`.
    #[arg(long, env = "DOCSTAMP_NODE_SERVER_NAME", global = true)]
    pub node_server_name: Option<String>,

    /// The service's secret signing key, base32.
    ///
    /// Prefer the environment variable or the config file over this flag.
    #[arg(long, env = "DOCSTAMP_SERVICE_SECRET_KEY", global = true, hide_env_values = true)]
    pub service_secret_key: Option<String>,

    /// mainnet, testnet or devnet.
    #[arg(long, env = "DOCSTAMP_NETWORK", global = true)]
    pub network: Option<String>,

    /// Base URL of the ledger's web index.
    #[arg(long, env = "DOCSTAMP_LEDGER_WEB_ADDRESS", global = true)]
    pub ledger_web_address: Option<String>,

    /// How long to wait for the node to acknowledge a submission.
    #[arg(long, env = "DOCSTAMP_SUBMISSION_TIMEOUT_MS", global = true)]
    pub submission_timeout_ms: Option<u64>,

    /// Directory of the metadata store. Defaults to `~/.docstamp/metadata`.
    #[arg(long, env = "DOCSTAMP_METADATA_PATH", global = true)]
    pub metadata_path: Option<PathBuf>,

    /// Log format: pretty or json.
    #[arg(long, env = "DOCSTAMP_LOG_FORMAT", default_value = "pretty", global = true)]
    pub log_format: String,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(
        long,
        env = "DOCSTAMP_LOG_LEVEL",
        default_value = "docstamp=info,docstamp_protocol=info",
        global = true
    )]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a fresh Ed25519 keypair.
    Keygen,
    /// Hash a file and sign it, producing a stamp request.
    Sign(SignArgs),
    /// Submit a stamp request to the ledger.
    Submit(SubmitArgs),
    /// Fetch a stamp from the ledger and verify it.
    Verify(VerifyArgs),
    /// List the verifiable stamps made for a public key.
    List(ListArgs),
    /// Show the service's signing key and network.
    Settings,
    /// Print version information and exit.
    Version,
}

#[derive(Parser, Debug)]
pub struct SignArgs {
    /// The document to stamp.
    pub file: PathBuf,

    /// The signer's secret key, base32.
    #[arg(long, env = "DOCSTAMP_USER_SECRET_KEY", hide_env_values = true)]
    pub key: String,

    /// File name to record. Defaults to the file's own name.
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Parser, Debug)]
pub struct SubmitArgs {
    /// Stamp request JSON, as written by `docstamp sign`. `-` reads stdin.
    pub request: PathBuf,

    /// Owner recorded alongside the stamp.
    #[arg(long, default_value = "cli")]
    pub user_id: String,
}

#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Transaction id, in either case.
    pub transaction_id: String,

    /// Also resolve the block inclusion time.
    #[arg(long)]
    pub timestamp: bool,
}

#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Public key, base32.
    pub public_key: String,
}
