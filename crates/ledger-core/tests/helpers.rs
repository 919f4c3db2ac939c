#![allow(dead_code)]

use ledger_core::{
    authorize_transaction, builder::create_transaction_at, Ed25519Scheme, KeyPair, Ledger,
    LedgerEntry, Transaction,
};

pub const POEM: &str = "Someone is in the kitchen washing the dishes.
Someone is in the living room watching the news.
Someone in a bedroom is holding a used stamp with tweezers and adding it to his collection.
Someone is scolding a dog, barking now for decades, a different...";

pub fn poem_lines() -> Vec<String> {
    POEM.lines().map(str::to_string).collect()
}

/// Sign `lines` as transactions addressed to the next entry of `ledger`.
pub fn signed_transactions(ledger: &Ledger, keys: &KeyPair, lines: &[&str]) -> Vec<Transaction> {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let tx = create_transaction_at(ledger, *line, 1_600_000_000_000 + i as u64)
                .expect("transaction");
            authorize_transaction(tx, keys, &Ed25519Scheme).expect("signature")
        })
        .collect()
}

/// Take the entries out, edit one, and rebuild the ledger around it.
pub fn tamper(ledger: Ledger, position: usize, edit: impl FnOnce(&mut LedgerEntry)) -> Ledger {
    let mut entries = ledger.into_entries();
    edit(&mut entries[position]);
    Ledger::from_entries(entries)
}
