//! # Transaction Module
//!
//! Construction, signing and verification of the ledger transactions that
//! record stamps.
//!
//! ## Architecture
//!
//! ```text
//! types.rs        - entries and StampTransaction, canonical signable bytes
//! builder.rs      - fluent StampTransactionBuilder, payload limit
//! signing.rs      - context-bound Ed25519 signing
//! verification.rs - self-consistency checks
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Build**: [`StampTransactionBuilder`] fills both entries from one set
//!    of values.
//! 2. **Sign**: [`sign_transaction`] with the service keypair under the
//!    network's `TransactionPublic` context.
//! 3. **Broadcast**: the correlation client ships it to the node.
//! 4. **Verify**: [`verify_transaction`] again when it comes back from the
//!    ledger index.
//!
//! ## Design Decisions
//!
//! - The transaction id is the upper-case base32 of the signature. It only
//!   exists once the transaction is signed.
//! - Amounts and fees are `u64` in the ledger's smallest unit.

pub mod builder;
pub mod signing;
pub mod types;
pub mod verification;

pub use builder::{build_stamp_transaction, BuildError, StampTransactionBuilder};
pub use signing::sign_transaction;
pub use types::{BaseEntry, ContractEntry, PublicEntry, StampTransaction, TransactionSignature};
pub use verification::{verify_transaction, verify_transaction_in_context, TransactionError};
