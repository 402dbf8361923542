//! # Oracle Configuration
//!
//! Configuration for the oracle services.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use crate::domain::DEFAULT_MIN_CONFIRMATIONS;

pub use crate::domain::BitcoinNetwork;

/// Oracle configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Source chain network (address validation).
    pub network: BitcoinNetwork,

    /// Confirmations before a block is summarized.
    pub min_confirmations: u64,

    /// New-block poll interval in seconds.
    pub poll_interval_secs: u64,

    /// Full gap reconciliation interval in seconds.
    pub reconcile_interval_secs: u64,

    /// How many recent published heights to read back from the ledger.
    pub published_heights_window: usize,

    /// Fixed delay before retrying a failed publication, in milliseconds.
    pub retry_delay_ms: u64,

    /// Upper bound of the random jitter added to the retry delay.
    pub retry_jitter_ms: u64,

    /// Attempts when reading a block before giving up on this cycle.
    pub block_read_attempts: u32,

    /// Delay between block read attempts, in milliseconds.
    pub block_read_delay_ms: u64,

    /// Pairing secret that triggers the greeting.
    pub pairing_secret: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            network: BitcoinNetwork::Mainnet,
            min_confirmations: DEFAULT_MIN_CONFIRMATIONS,
            poll_interval_secs: 30,
            reconcile_interval_secs: 600,
            published_heights_window: 100,
            retry_delay_ms: 300_000,
            retry_jitter_ms: 3_000,
            block_read_attempts: 3,
            block_read_delay_ms: 3_000,
            pairing_secret: "*".to_string(),
        }
    }
}

impl OracleConfig {
    /// Create a config for testing (short delays).
    pub fn for_testing() -> Self {
        Self {
            network: BitcoinNetwork::Mainnet,
            min_confirmations: 1,
            poll_interval_secs: 1,
            reconcile_interval_secs: 5,
            published_heights_window: 100,
            retry_delay_ms: 20,
            retry_jitter_ms: 5,
            block_read_attempts: 3,
            block_read_delay_ms: 1,
            pairing_secret: "*".to_string(),
        }
    }

    /// Poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Reconciliation interval as a `Duration`.
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs.max(1))
    }

    /// Delay between block read attempts.
    pub fn block_read_delay(&self) -> Duration {
        Duration::from_millis(self.block_read_delay_ms)
    }

    /// Retry delay for one attempt: fixed part plus jitter in `[0, retry_jitter_ms]`.
    pub fn retry_delay_with_jitter(&self) -> Duration {
        let jitter = if self.retry_jitter_ms == 0 {
            0
        } else {
            rand::random::<u64>() % (self.retry_jitter_ms + 1)
        };
        Duration::from_millis(self.retry_delay_ms + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OracleConfig::default();
        assert_eq!(config.min_confirmations, 2);
        assert_eq!(config.retry_delay_ms, 300_000);
        assert_eq!(config.block_read_attempts, 3);
        assert_eq!(config.published_heights_window, 100);
        assert_eq!(config.network, BitcoinNetwork::Mainnet);
    }

    #[test]
    fn test_testing_config() {
        let config = OracleConfig::for_testing();
        assert_eq!(config.min_confirmations, 1);
        assert!(config.retry_delay_ms < 1000);
    }

    #[test]
    fn test_retry_delay_bounds() {
        let config = OracleConfig::default();
        for _ in 0..100 {
            let delay = config.retry_delay_with_jitter();
            assert!(delay >= Duration::from_millis(300_000));
            assert!(delay <= Duration::from_millis(303_000));
        }
    }

    #[test]
    fn test_config_serde_roundtrip_network_name() {
        let json = serde_json::to_string(&OracleConfig::default()).unwrap();
        assert!(json.contains("\"mainnet\""));
        let back: OracleConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.network, BitcoinNetwork::Mainnet);
    }
}
