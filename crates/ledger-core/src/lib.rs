//! Append-only, tamper-evident ledger.
//!
//! Entries are chained by SHA-256 over a fixed canonical field set; entries
//! may carry blocks of individually signed transactions. Verification walks
//! the whole ledger and reports one result per entry and per transaction.

pub mod batch;
pub mod builder;
pub mod config;
pub mod constants;
pub mod digest;
pub mod entry;
pub mod error;
pub mod ledger;
pub mod signer;
pub mod verifier;

pub use batch::{
    authorize_transactions, verify_signed_chain, verify_signed_entry, verify_transactions,
};
pub use builder::{authorize_transaction, create_block, create_entry, create_transaction};
pub use config::LedgerConfig;
pub use digest::{digest_bytes, digest_str, digest_value};
pub use entry::{CanonicalFields, LedgerEntry, Transaction};
pub use error::{LedgerError, SignerError, VerifyError};
pub use ledger::{Ledger, SharedLedger};
pub use signer::{Ed25519Scheme, KeyPair, SignatureScheme, Verification};
pub use verifier::{
    is_chain_valid, verify_chain, verify_entry, verify_transaction, ChainReport, EntryReport,
    TransactionReport,
};
