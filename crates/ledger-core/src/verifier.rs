//! Integrity and authenticity checks.
//!
//! Every check returns a per-item result. A failure in one entry or
//! transaction is recorded in the report and the walk carries on.

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::constants::GENESIS_SENTINEL;
use crate::entry::{LedgerEntry, Transaction};
use crate::error::VerifyError;
use crate::ledger::Ledger;
use crate::signer::SignatureScheme;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionReport {
    pub position: usize,
    pub hash: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<VerifyError>,
}

impl TransactionReport {
    pub fn new(position: usize, hash: impl Into<String>, result: Result<(), VerifyError>) -> Self {
        let error = result.err();
        Self {
            position,
            hash: hash.into(),
            valid: error.is_none(),
            error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryReport {
    pub index: usize,
    pub hash: String,
    /// False if the entry itself or any embedded transaction failed.
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<VerifyError>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transactions: Vec<TransactionReport>,
}

impl EntryReport {
    pub fn new(
        index: usize,
        hash: impl Into<String>,
        result: Result<(), VerifyError>,
        transactions: Vec<TransactionReport>,
    ) -> Self {
        let error = result.err();
        let valid = error.is_none() && transactions.iter().all(|t| t.valid);
        Self {
            index,
            hash: hash.into(),
            valid,
            error,
            transactions,
        }
    }
}

/// One report per entry, in ledger order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    pub valid: bool,
    pub entries: Vec<EntryReport>,
}

impl ChainReport {
    pub fn new(entries: Vec<EntryReport>) -> Self {
        Self {
            valid: entries.iter().all(|e| e.valid),
            entries,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Positions of the entries that failed.
    pub fn failures(&self) -> Vec<usize> {
        self.entries
            .iter()
            .filter(|e| !e.valid)
            .map(|e| e.index)
            .collect()
    }

    pub fn entry(&self, position: usize) -> Option<&EntryReport> {
        self.entries.get(position)
    }

    pub(crate) fn log_summary(&self) {
        if self.valid {
            info!(entries = self.entries.len(), "chain verified");
        } else {
            warn!(
                entries = self.entries.len(),
                failures = ?self.failures(),
                "chain verification failed"
            );
        }
    }
}

/// Structural check of the entry at `position`: shape, own hash, and link to
/// its predecessor. Embedded transactions are not examined here.
pub fn verify_entry(ledger: &Ledger, position: usize) -> Result<(), VerifyError> {
    let entry = ledger.get(position).ok_or_else(|| {
        VerifyError::malformed(format!(
            "no entry at position {position} (ledger has {})",
            ledger.len()
        ))
    })?;

    if entry.payload.is_empty() {
        return Err(VerifyError::malformed("empty payload"));
    }
    if entry.previous_hash.is_empty() {
        return Err(VerifyError::malformed("missing previous hash"));
    }
    if entry.index != position as u64 {
        return Err(VerifyError::malformed(format!(
            "stored index {} at position {position}",
            entry.index
        )));
    }

    if position == 0 {
        return if entry.hash == GENESIS_SENTINEL {
            Ok(())
        } else {
            Err(VerifyError::HashMismatch {
                stored: entry.hash.clone(),
                computed: GENESIS_SENTINEL.to_string(),
            })
        };
    }

    let computed = entry
        .compute_hash()
        .map_err(|e| VerifyError::malformed(e.to_string()))?;
    if computed != entry.hash {
        return Err(VerifyError::HashMismatch {
            stored: entry.hash.clone(),
            computed,
        });
    }

    let previous = &ledger.entries()[position - 1];
    if entry.previous_hash != previous.hash {
        return Err(VerifyError::ChainBreak {
            expected: previous.hash.clone(),
            found: entry.previous_hash.clone(),
        });
    }

    Ok(())
}

/// Authenticity and integrity of one transaction, independent of its
/// container and its siblings.
pub fn verify_transaction<S: SignatureScheme + ?Sized>(
    scheme: &S,
    tx: &Transaction,
) -> Result<(), VerifyError> {
    let (Some(pub_key), Some(signature)) = (tx.pub_key.as_deref(), tx.signature.as_deref())
    else {
        return Err(VerifyError::signature("missing public key or signature"));
    };

    let verification = scheme.verify(signature, pub_key).map_err(|e| {
        warn!(hash = %tx.hash, error = %e, "signature backend fault");
        VerifyError::BackendFailure {
            reason: e.to_string(),
        }
    })?;
    if !verification.valid {
        return Err(VerifyError::signature(
            "signature does not verify against the embedded public key",
        ));
    }
    if verification.message != tx.data {
        return Err(VerifyError::signature("signature covers different data"));
    }

    let computed = tx
        .compute_hash()
        .map_err(|e| VerifyError::malformed(e.to_string()))?;
    if computed != tx.hash {
        return Err(VerifyError::HashMismatch {
            stored: tx.hash.clone(),
            computed,
        });
    }

    debug!(hash = %tx.hash, "transaction verified");
    Ok(())
}

/// Decode the transactions a block entry carries.
pub fn embedded_transactions(entry: &LedgerEntry) -> Result<Vec<Transaction>, VerifyError> {
    entry
        .transactions()
        .map_err(|e| VerifyError::malformed(format!("payload is not a transaction list: {e}")))
}

/// Structural verification of every entry. Entries are checked in parallel;
/// the report keeps ledger order.
pub fn verify_chain(ledger: &Ledger) -> ChainReport {
    let entries: Vec<EntryReport> = (0..ledger.len())
        .into_par_iter()
        .map(|position| {
            let hash = ledger.entries()[position].hash.clone();
            EntryReport::new(position, hash, verify_entry(ledger, position), Vec::new())
        })
        .collect();
    let report = ChainReport::new(entries);
    report.log_summary();
    report
}

pub fn is_chain_valid(ledger: &Ledger) -> bool {
    verify_chain(ledger).is_valid()
}
