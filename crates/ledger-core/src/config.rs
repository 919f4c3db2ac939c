use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::DEFAULT_SIGNATURE_TIMEOUT_MS;

/// Runtime knobs for signing and verifying batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Upper bound for one batch of signature operations.
    pub signature_timeout_ms: u64,
    /// Maximum number of signature operations in flight at once.
    pub verify_concurrency: usize,
}

impl LedgerConfig {
    pub fn signature_timeout(&self) -> Duration {
        Duration::from_millis(self.signature_timeout_ms)
    }

    pub fn with_signature_timeout(mut self, timeout: Duration) -> Self {
        self.signature_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            signature_timeout_ms: DEFAULT_SIGNATURE_TIMEOUT_MS,
            verify_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}
