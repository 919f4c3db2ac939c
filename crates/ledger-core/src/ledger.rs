use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::batch::authorize_transactions;
use crate::builder::{create_block, create_entry, create_transaction};
use crate::config::LedgerConfig;
use crate::entry::{now_millis, LedgerEntry};
use crate::error::LedgerError;
use crate::signer::{KeyPair, SignatureScheme};

/// Owned, index-addressed, append-only sequence of entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    /// A ledger holding only a genesis entry stamped now.
    pub fn new() -> Self {
        Self::with_genesis_at(now_millis())
    }

    pub fn with_genesis_at(timestamp: u64) -> Self {
        Self {
            entries: vec![LedgerEntry::genesis(timestamp)],
        }
    }

    /// Adopt entries as they are, e.g. after loading them from a file.
    /// Nothing is checked here; run the verifier over the result.
    pub fn from_entries(entries: Vec<LedgerEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&LedgerEntry> {
        self.entries.get(position)
    }

    pub fn tail(&self) -> Option<&LedgerEntry> {
        self.entries.last()
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<LedgerEntry> {
        self.entries
    }

    /// Commit an entry built against the current tail.
    pub fn append(&mut self, entry: LedgerEntry) -> Result<(), LedgerError> {
        let tail = self.tail().ok_or(LedgerError::EmptyLedger)?;
        let expected = self.entries.len() as u64;
        if entry.index != expected {
            return Err(LedgerError::OutOfSequence {
                expected,
                got: entry.index,
            });
        }
        if entry.previous_hash != tail.hash {
            return Err(LedgerError::StaleTail {
                expected: tail.hash.clone(),
                got: entry.previous_hash,
            });
        }
        debug!(index = entry.index, hash = %entry.hash, "entry appended");
        self.entries.push(entry);
        Ok(())
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

/// Clonable handle for a ledger shared between tasks.
///
/// Every append builds and commits under one write lock, so the tail an entry
/// links to is still the tail when it lands.
#[derive(Clone, Debug)]
pub struct SharedLedger {
    inner: Arc<RwLock<Ledger>>,
    config: LedgerConfig,
}

impl SharedLedger {
    pub fn new(ledger: Ledger, config: LedgerConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ledger)),
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// A point-in-time copy for verification or export.
    pub async fn snapshot(&self) -> Ledger {
        self.inner.read().await.clone()
    }

    /// Commit an entry built elsewhere.
    pub async fn append(&self, entry: LedgerEntry) -> Result<(), LedgerError> {
        self.inner.write().await.append(entry)
    }

    /// Build a plain entry for `payload` against the tail and commit it.
    pub async fn append_payload(
        &self,
        payload: impl Into<String>,
    ) -> Result<LedgerEntry, LedgerError> {
        let mut ledger = self.inner.write().await;
        let entry = create_entry(&ledger, payload)?;
        ledger.append(entry.clone())?;
        Ok(entry)
    }

    /// Turn each item of `data` into a transaction, sign them all concurrently
    /// and commit them as one block. Nothing is committed unless every
    /// signature was produced within the configured timeout.
    pub async fn append_signed_block<S, I>(
        &self,
        data: I,
        keys: &KeyPair,
        scheme: Arc<S>,
    ) -> Result<LedgerEntry, LedgerError>
    where
        S: SignatureScheme + 'static,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut ledger = self.inner.write().await;
        let unsigned = data
            .into_iter()
            .map(|d| create_transaction(&ledger, d))
            .collect::<Result<Vec<_>, _>>()?;
        let signed = authorize_transactions(unsigned, keys, scheme, &self.config).await?;
        let block = create_block(&ledger, &signed)?;
        ledger.append(block.clone())?;
        info!(
            index = block.index,
            transactions = signed.len(),
            "signed block committed"
        );
        Ok(block)
    }
}

impl Default for SharedLedger {
    fn default() -> Self {
        Self::new(Ledger::new(), LedgerConfig::default())
    }
}
