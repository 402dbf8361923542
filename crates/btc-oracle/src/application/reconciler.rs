//! # Gap Reconciler
//!
//! Finds confirmed heights the ledger does not hold yet and hands them to
//! the [`Publisher`] in ascending order, one at a time.
//!
//! Safe to run concurrently with itself and with the poller: the
//! publisher's idempotency checks drop duplicates.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::block_reader::BlockReader;
use super::publisher::{PublishOutcome, Publisher};
use crate::algorithms::{missing_heights, new_heights};
use crate::domain::OracleError;
use crate::ports::LedgerQuery;

/// What one reconciliation pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Confirmed height the pass worked against.
    pub confirmed: u64,
    /// Heights found missing, ascending.
    pub missing: Vec<u64>,
    /// Outcome per attempted height, in order.
    pub outcomes: Vec<(u64, PublishOutcome)>,
}

impl ReconcileReport {
    /// Heights posted by this pass (first attempt succeeded).
    pub fn published(&self) -> Vec<u64> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, PublishOutcome::Published { .. }))
            .map(|(h, _)| *h)
            .collect()
    }
}

/// Gap reconciler and new-block poller.
pub struct Reconciler {
    reader: BlockReader,
    ledger: Arc<dyn LedgerQuery>,
    publisher: Publisher,
    window: usize,
    last_confirmed: Mutex<Option<u64>>,
}

impl Reconciler {
    /// Create a reconciler reading back at most `window` published heights.
    pub fn new(
        reader: BlockReader,
        ledger: Arc<dyn LedgerQuery>,
        publisher: Publisher,
        window: usize,
    ) -> Self {
        Self {
            reader,
            ledger,
            publisher,
            window,
            last_confirmed: Mutex::new(None),
        }
    }

    /// Last confirmed height seen by a pass or a poll.
    pub fn last_confirmed(&self) -> Option<u64> {
        *self.last_confirmed.lock()
    }

    /// Publish every height missing from the ledger.
    ///
    /// Stops at the first failing height; it and everything after it stay
    /// owed for the next pass.
    pub async fn reconcile(&self) -> Result<ReconcileReport, OracleError> {
        let published = self.ledger.published_heights(self.window).await?;
        let confirmed = self.reader.confirmed_height().await?;
        let missing = missing_heights(&published, confirmed);
        self.remember(confirmed);

        if missing.is_empty() {
            debug!("[oracle] No gaps up to height {}", confirmed);
        } else {
            info!(
                "[oracle] Reconciling {} missing heights up to {}: {:?}",
                missing.len(),
                confirmed,
                missing
            );
        }

        let outcomes = self.publish_all(&missing).await?;
        Ok(ReconcileReport {
            confirmed,
            missing,
            outcomes,
        })
    }

    /// Publish heights confirmed since the previous poll.
    ///
    /// Returns nothing when the confirmed height has not moved.
    pub async fn poll_new_blocks(&self) -> Result<Vec<(u64, PublishOutcome)>, OracleError> {
        let confirmed = self.reader.confirmed_height().await?;
        let previous = self.last_confirmed();
        if previous == Some(confirmed) {
            debug!("[oracle] Confirmed height unchanged at {}", confirmed);
            return Ok(Vec::new());
        }

        let heights = new_heights(previous, confirmed);
        self.remember(confirmed);
        if !heights.is_empty() {
            info!(
                "[oracle] New confirmed height {} (previous {:?})",
                confirmed, previous
            );
        }
        self.publish_all(&heights).await
    }

    async fn publish_all(
        &self,
        heights: &[u64],
    ) -> Result<Vec<(u64, PublishOutcome)>, OracleError> {
        let mut outcomes = Vec::with_capacity(heights.len());
        for &height in heights {
            match self.publisher.publish_height(height).await {
                Ok(outcome) => outcomes.push((height, outcome)),
                Err(e) => {
                    warn!("[oracle] Height {} stays owed: {}", height, e);
                    return Err(e);
                }
            }
        }
        Ok(outcomes)
    }

    fn remember(&self, confirmed: u64) {
        let mut last = self.last_confirmed.lock();
        if last.map_or(true, |prev| confirmed > prev) {
            *last = Some(confirmed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryChain, InMemoryLedger, RecordingNotifier};
    use crate::application::{InFlightSet, PublicationTracker};
    use crate::config::OracleConfig;
    use crate::domain::{DataFeed, RawBlock, RawOutput, Satoshis};
    use tokio::sync::watch;

    struct Fixture {
        chain: Arc<InMemoryChain>,
        ledger: Arc<InMemoryLedger>,
        reconciler: Reconciler,
        _shutdown_tx: watch::Sender<bool>,
    }

    fn fixture(tip: u64) -> Fixture {
        let config = OracleConfig::for_testing();
        let chain = Arc::new(InMemoryChain::new());
        for height in 1..=tip {
            chain.insert_block(RawBlock {
                height,
                hash: format!("hash{}", height),
                outputs: vec![RawOutput::to_address("A", Satoshis(height))],
            });
        }
        let ledger = Arc::new(InMemoryLedger::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reader = BlockReader::new(chain.clone(), &config);
        let publisher = Publisher::new(
            config.clone(),
            reader.clone(),
            PublicationTracker::new(Arc::new(InFlightSet::new()), ledger.clone()),
            ledger.clone(),
            Arc::new(RecordingNotifier::new()),
            shutdown_rx,
        );
        let reconciler = Reconciler::new(
            reader,
            ledger.clone(),
            publisher,
            config.published_heights_window,
        );
        Fixture {
            chain,
            ledger,
            reconciler,
            _shutdown_tx: shutdown_tx,
        }
    }

    fn posted(ledger: &InMemoryLedger, height: u64) {
        ledger.insert_pending(DataFeed {
            bitcoin_hash: format!("hash{}", height),
            bitcoin_height: height,
            bitcoin_merkle: None,
            random_value: 1,
        });
    }

    fn heights(ledger: &InMemoryLedger) -> Vec<u64> {
        let mut h: Vec<u64> = ledger.feeds().iter().map(|f| f.bitcoin_height).collect();
        h.sort_unstable();
        h
    }

    #[tokio::test]
    async fn test_reconcile_fills_gaps() {
        let f = fixture(8);
        for h in [1, 2, 3, 5, 6] {
            posted(&f.ledger, h);
        }

        let report = f.reconciler.reconcile().await.unwrap();
        assert_eq!(report.confirmed, 8);
        assert_eq!(report.missing, vec![4, 7, 8]);
        assert_eq!(report.published(), vec![4, 7, 8]);
        assert_eq!(heights(&f.ledger), (1..=8).collect::<Vec<_>>());
        assert_eq!(f.reconciler.last_confirmed(), Some(8));
    }

    #[tokio::test]
    async fn test_reconcile_fresh_ledger_posts_only_confirmed() {
        let f = fixture(42);
        let report = f.reconciler.reconcile().await.unwrap();
        assert_eq!(report.missing, vec![42]);
        assert_eq!(heights(&f.ledger), vec![42]);
    }

    #[tokio::test]
    async fn test_reconcile_twice_is_noop() {
        let f = fixture(5);
        f.reconciler.reconcile().await.unwrap();
        let second = f.reconciler.reconcile().await.unwrap();
        assert!(second.missing.is_empty());
        assert_eq!(f.ledger.publish_count(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_stops_at_unreadable_height() {
        let f = fixture(6);
        posted(&f.ledger, 2);
        f.chain.remove_block(4);

        let result = f.reconciler.reconcile().await;
        assert!(matches!(result, Err(OracleError::ChainRead(_))));
        // 3 went through, 4 and later stay owed
        assert_eq!(heights(&f.ledger), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_poll_new_blocks_uses_cursor() {
        let f = fixture(10);
        let first = f.reconciler.poll_new_blocks().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].0, 10);

        // Unchanged tip
        assert!(f.reconciler.poll_new_blocks().await.unwrap().is_empty());

        for height in 11..=13 {
            f.chain.insert_block(RawBlock {
                height,
                hash: format!("hash{}", height),
                outputs: vec![],
            });
        }
        let next = f.reconciler.poll_new_blocks().await.unwrap();
        let polled: Vec<u64> = next.iter().map(|(h, _)| *h).collect();
        assert_eq!(polled, vec![11, 12, 13]);
        assert_eq!(heights(&f.ledger), vec![10, 11, 12, 13]);
    }

    #[tokio::test]
    async fn test_concurrent_reconcile_and_poll() {
        let f = fixture(7);
        posted(&f.ledger, 3);

        let (a, b) = tokio::join!(f.reconciler.reconcile(), f.reconciler.poll_new_blocks());
        a.unwrap();
        b.unwrap();
        assert_eq!(heights(&f.ledger), vec![3, 4, 5, 6, 7]);
    }
}
