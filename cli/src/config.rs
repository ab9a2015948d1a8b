//! Loading [`StampConfig`] for the binary.
//!
//! Precedence, lowest first: built-in defaults, the TOML file, then flags
//! and `DOCSTAMP_*` environment variables. The result still has to pass
//! `StampConfig::validate` before anything uses it.
//!
//! Stamp metadata is kept under `~/.docstamp/metadata` unless a path is
//! given. A leading `~/` in any configured path means the home directory.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use docstamp_protocol::config::StampConfig;
use docstamp_protocol::crypto::NetworkType;

use crate::cli::GlobalArgs;

pub fn load(args: &GlobalArgs) -> Result<StampConfig> {
    let mut config = match &args.config {
        Some(path) => from_file(path)?,
        None => StampConfig::default(),
    };
    apply_overrides(&mut config, args)?;

    let metadata_path = match config.metadata_path.take() {
        Some(path) => expand_home(&path),
        None => default_metadata_path(),
    };
    config.metadata_path = Some(metadata_path);
    config.node_ca_path = config.node_ca_path.take().map(|path| expand_home(&path));
    Ok(config)
}

pub fn default_metadata_path() -> PathBuf {
    expand_home(Path::new("~/.docstamp/metadata"))
}

/// Replaces a leading `~` with the home directory, when there is one.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

fn from_file(path: &Path) -> Result<StampConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse config file {}", path.display()))
}

fn apply_overrides(config: &mut StampConfig, args: &GlobalArgs) -> Result<()> {
    if let Some(address) = &args.node_address {
        config.node_address = address.clone();
    }
    if let Some(key) = &args.node_public_key {
        config.node_public_key = key.clone();
    }
    if let Some(path) = &args.node_ca_path {
        config.node_ca_path = Some(path.clone());
    }
    if let Some(name) = &args.node_server_name {
        config.node_server_name = Some(name.clone());
    }
    if let Some(key) = &args.service_secret_key {
        config.service_secret_key = key.clone();
    }
    if let Some(network) = &args.network {
        config.network = network
            .parse::<NetworkType>()
            .map_err(|e| anyhow::anyhow!(e))
            .context("invalid --network")?;
    }
    if let Some(address) = &args.ledger_web_address {
        config.ledger_web_address = address.clone();
    }
    if let Some(timeout) = args.submission_timeout_ms {
        config.submission_timeout_ms = timeout;
    }
    if let Some(path) = &args.metadata_path {
        config.metadata_path = Some(path.clone());
    }
    Ok(())
}
