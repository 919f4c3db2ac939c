use std::time::Duration;

use serde::Serialize;

/// Fatal errors raised while constructing, committing or batching.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger has no genesis entry to link to")]
    EmptyLedger,

    #[error("refusing to build an entry with an empty payload")]
    EmptyPayload,

    #[error("entry index {got} does not follow the tail (expected {expected})")]
    OutOfSequence { expected: u64, got: u64 },

    #[error("entry links to {got}, but the tail hash is {expected}")]
    StaleTail { expected: String, got: String },

    #[error("signing failed: {0}")]
    Signer(#[from] SignerError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("signature batch did not finish within {0:?}")]
    Timeout(Duration),

    #[error("signature task failed: {0}")]
    TaskFailed(String),
}

/// Faults raised by a signature backend on unreadable input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignerError {
    #[error("malformed key: {0}")]
    MalformedKey(String),

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("public key does not belong to the private key")]
    MismatchedKeyPair,
}

/// Why a single entry or transaction failed verification.
///
/// These are results, not faults: they are collected into reports and never
/// stop the rest of a chain walk.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerifyError {
    #[error("malformed entry: {reason}")]
    MalformedEntry { reason: String },

    #[error("hash mismatch: stored {stored}, computed {computed}")]
    HashMismatch { stored: String, computed: String },

    #[error("chain break: previous hash {found} does not match {expected}")]
    ChainBreak { expected: String, found: String },

    #[error("signature invalid: {reason}")]
    SignatureInvalid { reason: String },

    #[error("signature backend failure: {reason}")]
    BackendFailure { reason: String },
}

impl VerifyError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        VerifyError::MalformedEntry {
            reason: reason.into(),
        }
    }

    pub(crate) fn signature(reason: impl Into<String>) -> Self {
        VerifyError::SignatureInvalid {
            reason: reason.into(),
        }
    }
}
