//! Construction of entries and transactions against the current tail.
//!
//! Nothing here appends: callers commit with [`Ledger::append`] (or go through
//! [`crate::ledger::SharedLedger`], which does both under one lock).

use tracing::debug;

use crate::entry::{now_millis, LedgerEntry, Transaction};
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::signer::{KeyPair, SignatureScheme};

/// Index and link for whatever gets appended next.
fn next_link(ledger: &Ledger) -> Result<(u64, &str), LedgerError> {
    let tail = ledger.tail().ok_or(LedgerError::EmptyLedger)?;
    Ok((ledger.len() as u64, tail.hash.as_str()))
}

pub fn create_entry(
    ledger: &Ledger,
    payload: impl Into<String>,
) -> Result<LedgerEntry, LedgerError> {
    create_entry_at(ledger, payload, now_millis())
}

pub fn create_entry_at(
    ledger: &Ledger,
    payload: impl Into<String>,
    timestamp: u64,
) -> Result<LedgerEntry, LedgerError> {
    let payload = payload.into();
    if payload.is_empty() {
        return Err(LedgerError::EmptyPayload);
    }
    let (index, previous_hash) = next_link(ledger)?;
    let entry = LedgerEntry::new(index, previous_hash, payload, timestamp)?;
    debug!(index, hash = %entry.hash, "entry created");
    Ok(entry)
}

/// An unsigned transaction addressed to the entry that will be appended next.
pub fn create_transaction(
    ledger: &Ledger,
    data: impl Into<String>,
) -> Result<Transaction, LedgerError> {
    create_transaction_at(ledger, data, now_millis())
}

pub fn create_transaction_at(
    ledger: &Ledger,
    data: impl Into<String>,
    timestamp: u64,
) -> Result<Transaction, LedgerError> {
    let data = data.into();
    if data.is_empty() {
        return Err(LedgerError::EmptyPayload);
    }
    let (index, previous_hash) = next_link(ledger)?;
    Transaction::new(index, previous_hash, data, timestamp)
}

/// Attach the signer's public key and a signature over `data`.
///
/// Takes the transaction by value: its hash is already final and is left
/// untouched.
pub fn authorize_transaction<S: SignatureScheme + ?Sized>(
    mut tx: Transaction,
    keys: &KeyPair,
    scheme: &S,
) -> Result<Transaction, LedgerError> {
    let signature = scheme.sign(&tx.data, &keys.private_key)?;
    tx.pub_key = Some(keys.public_key.clone());
    tx.signature = Some(signature);
    Ok(tx)
}

/// An entry whose payload is the JSON array of `transactions`.
pub fn create_block(
    ledger: &Ledger,
    transactions: &[Transaction],
) -> Result<LedgerEntry, LedgerError> {
    create_block_at(ledger, transactions, now_millis())
}

pub fn create_block_at(
    ledger: &Ledger,
    transactions: &[Transaction],
    timestamp: u64,
) -> Result<LedgerEntry, LedgerError> {
    if transactions.is_empty() {
        return Err(LedgerError::EmptyPayload);
    }
    let payload = serde_json::to_string(transactions)?;
    create_entry_at(ledger, payload, timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GENESIS_SENTINEL;
    use crate::signer::Ed25519Scheme;

    #[test]
    fn first_entry_links_to_genesis_sentinel() {
        let ledger = Ledger::with_genesis_at(0);
        let entry = create_entry_at(&ledger, "a", 1_000).unwrap();
        assert_eq!(entry.index, 1);
        assert_eq!(entry.previous_hash, GENESIS_SENTINEL);
        assert_eq!(entry.payload, "a");
        assert_eq!(entry.hash, entry.compute_hash().unwrap());
    }

    #[test]
    fn create_does_not_append() {
        let ledger = Ledger::with_genesis_at(0);
        let _ = create_entry(&ledger, "a").unwrap();
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn empty_ledger_is_fatal() {
        let ledger = Ledger::from_entries(vec![]);
        assert!(matches!(
            create_entry(&ledger, "a"),
            Err(LedgerError::EmptyLedger)
        ));
        assert!(matches!(
            create_transaction(&ledger, "a"),
            Err(LedgerError::EmptyLedger)
        ));
    }

    #[test]
    fn empty_payload_is_fatal() {
        let ledger = Ledger::with_genesis_at(0);
        assert!(matches!(
            create_entry(&ledger, ""),
            Err(LedgerError::EmptyPayload)
        ));
        assert!(matches!(
            create_block(&ledger, &[]),
            Err(LedgerError::EmptyPayload)
        ));
    }

    #[test]
    fn authorize_keeps_hash_and_attaches_signature() {
        let ledger = Ledger::with_genesis_at(0);
        let keys = Ed25519Scheme::generate_keypair();
        let tx = create_transaction_at(&ledger, "pay bob", 5).unwrap();
        let hash = tx.hash.clone();
        let signed = authorize_transaction(tx, &keys, &Ed25519Scheme).unwrap();
        assert_eq!(signed.hash, hash);
        assert_eq!(signed.pub_key.as_deref(), Some(keys.public_key.as_str()));
        assert!(signed.signature.as_deref().unwrap().contains("pay bob"));
    }

    #[test]
    fn authorize_with_bad_key_fails() {
        let ledger = Ledger::with_genesis_at(0);
        let keys = KeyPair::new("garbage", "garbage");
        let tx = create_transaction(&ledger, "x").unwrap();
        assert!(matches!(
            authorize_transaction(tx, &keys, &Ed25519Scheme),
            Err(LedgerError::Signer(_))
        ));
    }

    #[test]
    fn block_payload_round_trips_transactions() {
        let ledger = Ledger::with_genesis_at(0);
        let txs = vec![
            create_transaction_at(&ledger, "one", 1).unwrap(),
            create_transaction_at(&ledger, "two", 2).unwrap(),
        ];
        let block = create_block_at(&ledger, &txs, 3).unwrap();
        assert_eq!(block.index, 1);
        assert_eq!(block.transactions().unwrap(), txs);
        assert!(txs.iter().all(|t| t.index == block.index));
        assert!(txs.iter().all(|t| t.previous_hash == block.previous_hash));
    }
}
