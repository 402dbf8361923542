//! # Block Reader
//!
//! Chain reads with bounded retries. After the last attempt the error is
//! returned and the height stays owed until the next reconciliation pass.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::algorithms::summarize;
use crate::config::OracleConfig;
use crate::domain::{confirmed_height, BlockSummary, OracleError, RawBlock};
use crate::ports::ChainReader;

/// Chain reader wrapper adding retries and the confirmation margin.
#[derive(Clone)]
pub struct BlockReader {
    chain: Arc<dyn ChainReader>,
    attempts: u32,
    delay: Duration,
    min_confirmations: u64,
}

impl BlockReader {
    /// Create a reader from config.
    pub fn new(chain: Arc<dyn ChainReader>, config: &OracleConfig) -> Self {
        Self {
            chain,
            attempts: config.block_read_attempts.max(1),
            delay: config.block_read_delay(),
            min_confirmations: config.min_confirmations,
        }
    }

    /// Highest confirmed height: `tip - min_confirmations + 1`.
    pub async fn confirmed_height(&self) -> Result<u64, OracleError> {
        let tip = self.chain.tip_height().await?;
        Ok(confirmed_height(tip, self.min_confirmations))
    }

    /// Read a block, retrying transient failures.
    pub async fn read_block(&self, height: u64) -> Result<RawBlock, OracleError> {
        let mut last_error = None;
        for attempt in 1..=self.attempts {
            match self.chain.block_at_height(height).await {
                Ok(block) => return Ok(block),
                Err(e) => {
                    warn!(
                        "[oracle] getBlock {} attempt {}/{} failed: {}",
                        height, attempt, self.attempts, e
                    );
                    last_error = Some(e);
                    if attempt < self.attempts {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }

        let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
        Err(OracleError::ChainRead(format!(
            "getBlock {} failed after {} attempts: {}",
            height, self.attempts, reason
        )))
    }

    /// Read and summarize the block at `height`.
    pub async fn summarize(&self, height: u64) -> Result<BlockSummary, OracleError> {
        let block = self.read_block(height).await?;
        summarize(&block)
    }
}
