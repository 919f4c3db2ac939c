use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::constants::HASH_HEX_SIZE;
use crate::error::LedgerError;

/// SHA-256 of raw bytes as lowercase hex.
pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hash a string that is already in canonical form. No re-serialization:
/// `"a"` hashes the single byte `a`, not the JSON literal `"\"a\""`.
pub fn digest_str(value: &str) -> String {
    digest_bytes(value.as_bytes())
}

/// Serialize `value` to compact JSON and hash the result.
///
/// Field order follows the struct declaration order, so callers must hash a
/// type with a fixed layout (see [`crate::entry::CanonicalFields`]) rather than
/// a map.
pub fn digest_value<T: Serialize + ?Sized>(value: &T) -> Result<String, LedgerError> {
    let json = serde_json::to_string(value)?;
    Ok(digest_str(&json))
}

/// True when `value` looks like an output of this module.
pub fn is_digest(value: &str) -> bool {
    value.len() == HASH_HEX_SIZE
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
