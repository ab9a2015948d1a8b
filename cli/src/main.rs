// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # DocStamp CLI
//!
//! Entry point for the `docstamp` binary.
//!
//! - `keygen`   - generate a keypair
//! - `sign`     - hash and sign a document into a stamp request
//! - `submit`   - stamp a request on the ledger
//! - `verify`   - fetch and verify a stamp by transaction id
//! - `list`     - list stamps for a public key
//! - `settings` - show the service signing key
//! - `version`  - print build version information
//!
//! Results are printed to stdout as `{"success": ..., "data" | "error": ...}`.
//! `sign` is the exception: it prints the bare stamp request so the output
//! can be fed straight into `submit`.

mod cli;
mod config;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::ExitCode;
use tokio::signal;

use docstamp_protocol::config::WIRE_PROTOCOL_VERSION;
use docstamp_protocol::crypto::{hash_reader, StampKeypair};
use docstamp_protocol::proof::{self, sign_stamp_request, StampRequest};
use docstamp_protocol::{ApiResult, DefaultStampService, StampError, StampService};

use cli::{Commands, DocStampCli, GlobalArgs};
use logging::LogFormat;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedKey {
    public_key: String,
    secret_key: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = DocStampCli::parse();
    logging::init_logging(
        &cli.global.log_level,
        LogFormat::from_str_lossy(&cli.global.log_format),
    );

    match cli.command {
        Commands::Keygen => {
            let keypair = StampKeypair::generate();
            emit(Ok(GeneratedKey {
                public_key: keypair.public_key().to_base32(),
                secret_key: keypair.secret_key_base32(),
            }))
        }
        Commands::Sign(args) => sign_file(args),
        Commands::Submit(args) => {
            let request = read_request(&args.request)?;
            let service = open_service(&cli.global)?;
            let result = tokio::select! {
                result = service.submit(request, &args.user_id) => result,
                _ = shutdown_signal() => {
                    tracing::info!("interrupted, abandoning submission");
                    Err(StampError::Cancelled)
                }
            };
            service.shutdown().await;
            emit(result)
        }
        Commands::Verify(args) => {
            let service = open_service(&cli.global)?;
            emit(service.verify(&args.transaction_id, args.timestamp).await)
        }
        Commands::List(args) => {
            let service = open_service(&cli.global)?;
            emit(service.list_stamps(&args.public_key).await)
        }
        Commands::Settings => {
            let service = open_service(&cli.global)?;
            emit(Ok(service.settings()))
        }
        Commands::Version => {
            print_version();
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn open_service(global: &GlobalArgs) -> Result<DefaultStampService> {
    let config = config::load(global)?
        .validate()
        .context("invalid configuration")?;
    tracing::info!(
        node = %config.node_address,
        network = %config.network,
        ledger = %config.ledger_web_address,
        "configuration loaded"
    );
    DefaultStampService::from_config(config).context("failed to start stamp service")
}

/// Prints the result envelope. Failure results exit non-zero.
fn emit<T: Serialize>(result: Result<T, StampError>) -> Result<ExitCode> {
    if let Err(e) = &result {
        tracing::warn!(kind = e.kind(), error = %e, "command failed");
    }
    let envelope = ApiResult::from(result);
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(if envelope.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn sign_file(args: cli::SignArgs) -> Result<ExitCode> {
    let keypair = StampKeypair::from_base32(&args.key).context("invalid --key")?;
    let file = File::open(&args.file)
        .with_context(|| format!("failed to open {}", args.file.display()))?;
    let digest = hash_reader(file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let name = match args.name {
        Some(name) => name,
        None => args
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("file has no name; pass --name")?,
    };
    let request = sign_stamp_request(&keypair, digest, name);
    request.check_fields().context("cannot stamp this file")?;

    tracing::info!(file_hash = %request.file_hash, "document signed");
    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(ExitCode::SUCCESS)
}

fn read_request(path: &Path) -> Result<StampRequest> {
    let mut bytes = Vec::new();
    if path == Path::new("-") {
        std::io::stdin()
            .read_to_end(&mut bytes)
            .context("failed to read stamp request from stdin")?;
    } else {
        bytes = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
    }
    proof::decode(&bytes).context("malformed stamp request")
}

fn print_version() {
    println!("docstamp {}", env!("CARGO_PKG_VERSION"));
    println!("wire      v{}", WIRE_PROTOCOL_VERSION);
}

/// Waits for SIGINT or SIGTERM. Never resolves if neither handler can be
/// installed.
async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
