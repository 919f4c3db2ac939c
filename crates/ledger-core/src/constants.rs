pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const SIGNATURE_SIZE: usize = 64;
pub const KEY_SIZE: usize = 32;

/// Placeholder carried by the genesis entry in place of a real digest.
pub const GENESIS_SENTINEL: &str = "000000";

pub const DEFAULT_SIGNATURE_TIMEOUT_MS: u64 = 5_000;
