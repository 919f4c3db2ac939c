//! Concurrent signing and verification.
//!
//! Each batch runs as one task group on the blocking pool with a bounded
//! number of operations in flight. The group is joined completely before any
//! result is used, and results are slotted back by position, so completion
//! order never matters. The whole group runs under the configured timeout;
//! on expiry the remaining tasks are aborted and the batch fails.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::builder::authorize_transaction;
use crate::config::LedgerConfig;
use crate::entry::Transaction;
use crate::error::{LedgerError, VerifyError};
use crate::ledger::Ledger;
use crate::signer::{KeyPair, SignatureScheme};
use crate::verifier::{
    embedded_transactions, verify_entry, verify_transaction, ChainReport, EntryReport,
    TransactionReport,
};

/// Sign every transaction. Either all of them come back signed, in input
/// order, or the first failure is returned and nothing is kept.
pub async fn authorize_transactions<S>(
    transactions: Vec<Transaction>,
    keys: &KeyPair,
    scheme: Arc<S>,
    config: &LedgerConfig,
) -> Result<Vec<Transaction>, LedgerError>
where
    S: SignatureScheme + 'static,
{
    let keys = Arc::new(keys.clone());
    let jobs: Vec<_> = transactions
        .into_iter()
        .map(|tx| {
            let keys = Arc::clone(&keys);
            let scheme = Arc::clone(&scheme);
            move || authorize_transaction(tx, &keys, scheme.as_ref())
        })
        .collect();
    let signed = fan_out(jobs, config)
        .await?
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;
    debug!(count = signed.len(), "transactions authorized");
    Ok(signed)
}

/// Verify a loose batch of transactions, one report per input in input order.
pub async fn verify_transactions<S>(
    transactions: Vec<Transaction>,
    scheme: Arc<S>,
    config: &LedgerConfig,
) -> Result<Vec<TransactionReport>, LedgerError>
where
    S: SignatureScheme + 'static,
{
    let jobs: Vec<_> = transactions
        .into_iter()
        .enumerate()
        .map(|(position, tx)| verification_job(&scheme, position, tx))
        .collect();
    fan_out(jobs, config).await
}

/// Structural check of one block entry plus every transaction it carries.
pub async fn verify_signed_entry<S>(
    ledger: &Ledger,
    position: usize,
    scheme: Arc<S>,
    config: &LedgerConfig,
) -> Result<EntryReport, LedgerError>
where
    S: SignatureScheme + 'static,
{
    let mut plan = Plan::default();
    let outcome = plan.add_entry(ledger, position, &scheme);
    let mut grouped = plan.run(1, |_| 0, config).await?;
    let hash = ledger
        .get(position)
        .map(|e| e.hash.clone())
        .unwrap_or_default();
    Ok(EntryReport::new(position, hash, outcome, grouped.remove(0)))
}

/// Verify every entry and every embedded transaction under a single join
/// barrier. Genesis is checked structurally only.
pub async fn verify_signed_chain<S>(
    ledger: &Ledger,
    scheme: Arc<S>,
    config: &LedgerConfig,
) -> Result<ChainReport, LedgerError>
where
    S: SignatureScheme + 'static,
{
    let mut plan = Plan::default();
    let outcomes: Vec<_> = (0..ledger.len())
        .map(|position| plan.add_entry(ledger, position, &scheme))
        .collect();
    let grouped = plan.run(ledger.len(), |owner| owner, config).await?;

    let entries = outcomes
        .into_iter()
        .zip(grouped)
        .enumerate()
        .map(|(position, (outcome, transactions))| {
            let hash = ledger.entries()[position].hash.clone();
            EntryReport::new(position, hash, outcome, transactions)
        })
        .collect();
    let report = ChainReport::new(entries);
    report.log_summary();
    Ok(report)
}

type VerificationJob = Box<dyn FnOnce() -> TransactionReport + Send + 'static>;

/// Transactions collected across entries, remembering which entry owns each.
#[derive(Default)]
struct Plan {
    owners: Vec<usize>,
    jobs: Vec<VerificationJob>,
}

impl Plan {
    /// Queue the transactions of the entry at `position` and return its
    /// structural outcome.
    fn add_entry<S>(
        &mut self,
        ledger: &Ledger,
        position: usize,
        scheme: &Arc<S>,
    ) -> Result<(), VerifyError>
    where
        S: SignatureScheme + 'static,
    {
        let structural = verify_entry(ledger, position);
        if position == 0 {
            return structural;
        }
        let Some(entry) = ledger.get(position) else {
            return structural;
        };
        let transactions = match embedded_transactions(entry) {
            Ok(txs) if txs.is_empty() => {
                return structural
                    .and(Err(VerifyError::malformed("block carries no transactions")));
            }
            Ok(txs) => txs,
            Err(e) => return structural.and(Err(e)),
        };
        for (tx_position, tx) in transactions.into_iter().enumerate() {
            self.owners.push(position);
            self.jobs
                .push(Box::new(verification_job(scheme, tx_position, tx)));
        }
        structural
    }

    /// Run all queued jobs and group the reports into `slots` buckets.
    async fn run(
        self,
        slots: usize,
        bucket: impl Fn(usize) -> usize,
        config: &LedgerConfig,
    ) -> Result<Vec<Vec<TransactionReport>>, LedgerError> {
        let reports = fan_out(self.jobs, config).await?;
        let mut grouped: Vec<Vec<TransactionReport>> = vec![Vec::new(); slots];
        for (owner, report) in self.owners.into_iter().zip(reports) {
            grouped[bucket(owner)].push(report);
        }
        Ok(grouped)
    }
}

/// Checks one transaction. A panicking backend only fails this transaction.
fn verification_job<S>(
    scheme: &Arc<S>,
    position: usize,
    tx: Transaction,
) -> impl FnOnce() -> TransactionReport + Send + 'static
where
    S: SignatureScheme + 'static,
{
    let scheme = Arc::clone(scheme);
    move || {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            verify_transaction(scheme.as_ref(), &tx)
        }))
        .unwrap_or_else(|_| {
            warn!(hash = %tx.hash, "signature backend panicked");
            Err(VerifyError::BackendFailure {
                reason: "signature backend panicked".into(),
            })
        });
        if let Err(e) = &result {
            warn!(position, hash = %tx.hash, error = %e, "transaction failed verification");
        }
        TransactionReport::new(position, tx.hash.clone(), result)
    }
}

/// Run `jobs` under the configured timeout and return their outputs in input
/// order.
async fn fan_out<T, F>(jobs: Vec<F>, config: &LedgerConfig) -> Result<Vec<T>, LedgerError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let timeout = config.signature_timeout();
    match tokio::time::timeout(timeout, join_all(jobs, config.verify_concurrency)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(?timeout, "signature batch timed out");
            Err(LedgerError::Timeout(timeout))
        }
    }
}

async fn join_all<T, F>(jobs: Vec<F>, concurrency: usize) -> Result<Vec<T>, LedgerError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut set = JoinSet::new();
    let mut slots: Vec<Option<T>> = Vec::with_capacity(jobs.len());

    for (position, job) in jobs.into_iter().enumerate() {
        slots.push(None);
        let permit = Arc::clone(&permits)
            .acquire_owned()
            .await
            .map_err(|e| LedgerError::TaskFailed(e.to_string()))?;
        set.spawn_blocking(move || {
            let _permit = permit;
            (position, job())
        });
    }

    while let Some(joined) = set.join_next().await {
        let (position, value) = joined.map_err(|e| LedgerError::TaskFailed(e.to_string()))?;
        slots[position] = Some(value);
    }

    slots
        .into_iter()
        .collect::<Option<Vec<T>>>()
        .ok_or_else(|| LedgerError::TaskFailed("a task finished without a result".into()))
}
