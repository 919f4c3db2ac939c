use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::GENESIS_SENTINEL;
use crate::digest::digest_value;
use crate::error::LedgerError;

/// The exact field set a ledger digest covers, in hashing order.
///
/// Serialized as compact JSON, e.g.
/// `{"index":1,"prevHash":"000000","data":"a","timestamp":1700000000000}`.
/// Signature material and the digest itself are deliberately absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CanonicalFields<'a> {
    pub index: u64,
    #[serde(rename = "prevHash")]
    pub previous_hash: &'a str,
    pub data: &'a str,
    pub timestamp: u64,
}

impl CanonicalFields<'_> {
    pub fn digest(&self) -> Result<String, LedgerError> {
        digest_value(self)
    }
}

/// One link of the hash chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub index: u64,
    pub previous_hash: String,
    pub payload: String,
    pub timestamp: u64,
    pub hash: String,
}

impl LedgerEntry {
    /// Build an entry and stamp it with the digest of its other fields.
    pub fn new(
        index: u64,
        previous_hash: impl Into<String>,
        payload: impl Into<String>,
        timestamp: u64,
    ) -> Result<Self, LedgerError> {
        let mut entry = Self {
            index,
            previous_hash: previous_hash.into(),
            payload: payload.into(),
            timestamp,
            hash: String::new(),
        };
        entry.hash = entry.compute_hash()?;
        Ok(entry)
    }

    pub fn genesis(timestamp: u64) -> Self {
        Self {
            index: 0,
            previous_hash: GENESIS_SENTINEL.to_string(),
            payload: GENESIS_SENTINEL.to_string(),
            timestamp,
            hash: GENESIS_SENTINEL.to_string(),
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    pub fn canonical_fields(&self) -> CanonicalFields<'_> {
        CanonicalFields {
            index: self.index,
            previous_hash: &self.previous_hash,
            data: &self.payload,
            timestamp: self.timestamp,
        }
    }

    pub fn compute_hash(&self) -> Result<String, LedgerError> {
        self.canonical_fields().digest()
    }

    /// Decode the payload of a transactional entry.
    pub fn transactions(&self) -> Result<Vec<Transaction>, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}

/// A hash-stamped unit of data, optionally signed by its author.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub index: u64,
    pub previous_hash: String,
    pub data: String,
    pub timestamp: u64,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Transaction {
    /// Build an unsigned transaction. The hash is final at this point; signing
    /// later never touches it.
    pub fn new(
        index: u64,
        previous_hash: impl Into<String>,
        data: impl Into<String>,
        timestamp: u64,
    ) -> Result<Self, LedgerError> {
        let mut tx = Self {
            index,
            previous_hash: previous_hash.into(),
            data: data.into(),
            timestamp,
            hash: String::new(),
            pub_key: None,
            signature: None,
        };
        tx.hash = tx.compute_hash()?;
        Ok(tx)
    }

    pub fn is_signed(&self) -> bool {
        self.pub_key.is_some() && self.signature.is_some()
    }

    pub fn canonical_fields(&self) -> CanonicalFields<'_> {
        CanonicalFields {
            index: self.index,
            previous_hash: &self.previous_hash,
            data: &self.data,
            timestamp: self.timestamp,
        }
    }

    pub fn compute_hash(&self) -> Result<String, LedgerError> {
        self.canonical_fields().digest()
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
