// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # DocStamp Protocol: Core Library
//!
//! Proof of existence for documents, recorded on a ledger. A client hashes
//! a document, signs the hash and file name, and hands us the result. We
//! wrap that claim in a signed ledger transaction, push it to a ledger node
//! and wait for the node to acknowledge it. Later, anyone holding the
//! transaction id can pull the stamp back out of the ledger and check both
//! signatures without trusting us.
//!
//! ## Architecture
//!
//! - **crypto**: Ed25519 keys and signing contexts, BLAKE3 digests, base32.
//! - **proof**: The user's stamp request: canonical bytes, codec, verifier.
//! - **transaction**: Building, signing and checking stamp transactions.
//! - **wire**: Signed envelopes and the binary framing spoken with the node.
//! - **client**: The correlation client: one connection, many in-flight
//!   requests, each with its own deadline.
//! - **retriever**: Rebuilding and re-verifying proofs from ledger data.
//! - **store**: Metadata records for stamps this service submitted.
//! - **service**: The submission/verification facade the CLI drives.
//! - **config**: Constants, runtime configuration and its validation.
//! - **error**: The service-level error taxonomy.
//!
//! ## Ground Rules
//!
//! 1. Validate before touching the network. A bad request never costs a
//!    round trip.
//! 2. Never trust what comes back. Envelopes are checked against the node
//!    key, ledger records against their own signatures.
//! 3. No retries in the library. A timeout is an answer.

pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod proof;
pub mod retriever;
pub mod service;
pub mod store;
pub mod transaction;
pub mod wire;

pub use error::StampError;
pub use service::{ApiResult, DefaultStampService, StampService};
