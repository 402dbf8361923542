//! # Publisher
//!
//! Publishes the summary of one height, at most once per block hash.
//!
//! ## State Machine
//!
//! ```text
//! Pending → Building → Checking → Publishing → Done
//!                         │            │
//!                         │            └─ failure → Retrying ─┐
//!                         │                   ↑               │
//!                         └─ abandon          └───────────────┘
//! ```
//!
//! Every attempt, first or retry, runs under the single "post" lock. The
//! in-flight set is checked before and after the durability query, and the
//! second check claims the hash atomically.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use super::block_reader::BlockReader;
use super::tracker::PublicationTracker;
use crate::config::OracleConfig;
use crate::domain::{DataFeed, OracleError};
use crate::ports::{LedgerPublisher, OperatorNotifier};

/// Subject of operator alerts for failed postings.
pub const FAILED_POSTING_SUBJECT: &str = "failed posting";

/// Stage of one publication.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishState {
    /// Waiting for the post lock.
    Pending,
    /// Reading and canonicalizing the block.
    Building,
    /// Idempotency checks.
    Checking,
    /// Ledger client call in progress.
    Publishing,
    /// Durably posted.
    Done,
    /// Failed, a retry is scheduled.
    Retrying,
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PublishState::Pending => "pending",
            PublishState::Building => "building",
            PublishState::Checking => "checking",
            PublishState::Publishing => "publishing",
            PublishState::Done => "done",
            PublishState::Retrying => "retrying",
        };
        f.write_str(name)
    }
}

/// Result of a publication request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Feed posted by this call.
    Published {
        /// Block height
        height: u64,
        /// Block hash
        hash: String,
    },
    /// Another attempt for the same hash is running.
    AlreadyInFlight {
        /// Block hash
        hash: String,
    },
    /// The ledger already holds a feed for this hash.
    AlreadyPublished {
        /// Block hash
        hash: String,
    },
    /// Posting failed; a background retry owns the hash now.
    RetryScheduled {
        /// Block hash
        hash: String,
    },
}

impl PublishOutcome {
    /// Block hash the outcome refers to.
    pub fn hash(&self) -> &str {
        match self {
            PublishOutcome::Published { hash, .. }
            | PublishOutcome::AlreadyInFlight { hash }
            | PublishOutcome::AlreadyPublished { hash }
            | PublishOutcome::RetryScheduled { hash } => hash,
        }
    }
}

/// Publishes block summaries to the ledger.
///
/// Cheap to clone; clones share the post lock, the in-flight set and the
/// retry counter.
#[derive(Clone)]
pub struct Publisher {
    config: OracleConfig,
    reader: BlockReader,
    tracker: PublicationTracker,
    ledger: Arc<dyn LedgerPublisher>,
    notifier: Arc<dyn OperatorNotifier>,
    post_lock: Arc<Mutex<()>>,
    shutdown: watch::Receiver<bool>,
    pending_retries: Arc<AtomicUsize>,
}

impl Publisher {
    /// Create a publisher.
    ///
    /// Retry tasks stop when `shutdown` turns `true` or its sender is dropped.
    pub fn new(
        config: OracleConfig,
        reader: BlockReader,
        tracker: PublicationTracker,
        ledger: Arc<dyn LedgerPublisher>,
        notifier: Arc<dyn OperatorNotifier>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            reader,
            tracker,
            ledger,
            notifier,
            post_lock: Arc::new(Mutex::new(())),
            shutdown,
            pending_retries: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Publication tracker in use.
    pub fn tracker(&self) -> &PublicationTracker {
        &self.tracker
    }

    /// Number of retry tasks still waiting to post.
    pub fn pending_retries(&self) -> usize {
        self.pending_retries.load(Ordering::SeqCst)
    }

    /// Publish the summary of `height`.
    ///
    /// Idempotency abandons are `Ok` outcomes. Errors mean nothing was
    /// claimed and the height is still owed.
    pub async fn publish_height(&self, height: u64) -> Result<PublishOutcome, OracleError> {
        trace_state(height, PublishState::Pending);
        let _post = self.post_lock.lock().await;
        info!("[oracle] Will post data of block {}", height);

        trace_state(height, PublishState::Building);
        let summary = self.reader.summarize(height).await?;
        let hash = summary.hash.clone();

        trace_state(height, PublishState::Checking);
        if self.tracker.is_in_flight(&hash) {
            info!("[oracle] Block {} already queued", hash);
            return Ok(PublishOutcome::AlreadyInFlight { hash });
        }
        if self.tracker.is_published(&hash).await? {
            info!("[oracle] Block {} already processed", hash);
            return Ok(PublishOutcome::AlreadyPublished { hash });
        }
        if !self.tracker.begin(&hash) {
            info!("[oracle] Block {} already queued (second check)", hash);
            return Ok(PublishOutcome::AlreadyInFlight { hash });
        }

        let feed = DataFeed::from(&summary);
        trace_state(height, PublishState::Publishing);
        match self.ledger.publish(&feed).await {
            Ok(()) => {
                self.tracker.finish(&hash);
                trace_state(height, PublishState::Done);
                info!(
                    "[oracle] Posted block {} {} ({} elements, random {})",
                    height,
                    hash,
                    summary.elements.len(),
                    summary.random_value
                );
                Ok(PublishOutcome::Published { height, hash })
            }
            Err(e) => {
                self.notify_failure(&feed, &e).await;
                trace_state(height, PublishState::Retrying);
                self.schedule_retry(feed);
                Ok(PublishOutcome::RetryScheduled { hash })
            }
        }
    }

    async fn notify_failure(&self, feed: &DataFeed, err: &OracleError) {
        error!(
            "[oracle] Posting block {} {} failed: {}",
            feed.bitcoin_height, feed.bitcoin_hash, err
        );
        let body = format!(
            "Posting data feed of block {} ({}) failed: {}",
            feed.bitcoin_height, feed.bitcoin_hash, err
        );
        self.notifier.notify(FAILED_POSTING_SUBJECT, &body).await;
    }

    /// Spawn the retry loop. The hash stays in flight until it exits.
    fn schedule_retry(&self, feed: DataFeed) {
        let publisher = self.clone();
        self.pending_retries.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            publisher.retry_until_durable(feed).await;
            publisher.pending_retries.fetch_sub(1, Ordering::SeqCst);
        });
    }

    async fn retry_until_durable(&self, feed: DataFeed) {
        let mut shutdown = self.shutdown.clone();
        let hash = feed.bitcoin_hash.clone();

        loop {
            if *shutdown.borrow() {
                return;
            }
            let delay = self.config.retry_delay_with_jitter();
            info!("[oracle] Will retry posting block {} in {:?}", hash, delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {
                    info!("[oracle] Shutdown, dropping retry of block {}", hash);
                    return;
                }
            }

            let _post = self.post_lock.lock().await;
            match self.tracker.is_published(&hash).await {
                Ok(true) => {
                    info!("[oracle] Block {} posted meanwhile, not retrying", hash);
                    self.tracker.finish(&hash);
                    return;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("[oracle] Durability check for {} failed: {}", hash, e);
                    continue;
                }
            }

            match self.ledger.publish(&feed).await {
                Ok(()) => {
                    self.tracker.finish(&hash);
                    info!("[oracle] Posted block {} {} on retry", feed.bitcoin_height, hash);
                    return;
                }
                Err(e) => self.notify_failure(&feed, &e).await,
            }
        }
    }
}

fn trace_state(height: u64, state: PublishState) {
    debug!("[oracle] Height {} -> {}", height, state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryChain, InMemoryLedger, RecordingNotifier};
    use crate::application::InFlightSet;
    use crate::domain::{RawBlock, RawOutput, Satoshis};
    use std::time::Duration;

    struct Fixture {
        chain: Arc<InMemoryChain>,
        ledger: Arc<InMemoryLedger>,
        notifier: Arc<RecordingNotifier>,
        publisher: Publisher,
        _shutdown_tx: watch::Sender<bool>,
    }

    fn fixture() -> Fixture {
        let config = OracleConfig::for_testing();
        let chain = Arc::new(InMemoryChain::new());
        for height in 1..=3 {
            chain.insert_block(RawBlock {
                height,
                hash: format!("hash{}", height),
                outputs: vec![RawOutput::to_address("A", Satoshis(height * 1000))],
            });
        }
        let ledger = Arc::new(InMemoryLedger::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let publisher = Publisher::new(
            config.clone(),
            BlockReader::new(chain.clone(), &config),
            PublicationTracker::new(Arc::new(InFlightSet::new()), ledger.clone()),
            ledger.clone(),
            notifier.clone(),
            shutdown_rx,
        );
        Fixture {
            chain,
            ledger,
            notifier,
            publisher,
            _shutdown_tx: shutdown_tx,
        }
    }

    async fn wait_for_retries(publisher: &Publisher) {
        for _ in 0..200 {
            if publisher.pending_retries() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("retries did not settle");
    }

    #[tokio::test]
    async fn test_publish_height() {
        let f = fixture();
        let outcome = f.publisher.publish_height(1).await.unwrap();
        assert_eq!(
            outcome,
            PublishOutcome::Published {
                height: 1,
                hash: "hash1".to_string()
            }
        );

        let feeds = f.ledger.feeds();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].bitcoin_height, 1);
        assert!(feeds[0].bitcoin_merkle.is_some());
        assert!(f.publisher.tracker().in_flight().is_empty());
    }

    #[tokio::test]
    async fn test_publish_twice_is_abandoned() {
        let f = fixture();
        f.publisher.publish_height(2).await.unwrap();
        let second = f.publisher.publish_height(2).await.unwrap();
        assert_eq!(
            second,
            PublishOutcome::AlreadyPublished {
                hash: "hash2".to_string()
            }
        );
        assert_eq!(f.ledger.publish_count(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_hash_is_abandoned() {
        let f = fixture();
        f.publisher.tracker().in_flight().try_insert("hash3");
        let outcome = f.publisher.publish_height(3).await.unwrap();
        assert_eq!(
            outcome,
            PublishOutcome::AlreadyInFlight {
                hash: "hash3".to_string()
            }
        );
        assert_eq!(f.ledger.publish_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_block_hash_aborts_height() {
        let f = fixture();
        f.chain.insert_block(RawBlock {
            height: 9,
            hash: String::new(),
            outputs: vec![],
        });
        let result = f.publisher.publish_height(9).await;
        assert!(matches!(result, Err(OracleError::MissingBlockHash { height: 9 })));
        assert!(f.publisher.tracker().in_flight().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_block_is_error_not_claimed() {
        let f = fixture();
        let result = f.publisher.publish_height(42).await;
        assert!(matches!(result, Err(OracleError::ChainRead(_))));
        assert!(f.publisher.tracker().in_flight().is_empty());
    }

    #[tokio::test]
    async fn test_failure_retries_until_posted() {
        let f = fixture();
        f.ledger.fail_next_publishes(2);

        let outcome = f.publisher.publish_height(1).await.unwrap();
        assert_eq!(
            outcome,
            PublishOutcome::RetryScheduled {
                hash: "hash1".to_string()
            }
        );
        assert!(f.publisher.tracker().is_in_flight("hash1"));

        wait_for_retries(&f.publisher).await;
        assert_eq!(f.ledger.feeds().len(), 1);
        assert!(!f.publisher.tracker().is_in_flight("hash1"));
        assert_eq!(f.notifier.count(), 2);
        assert_eq!(f.notifier.subjects()[0], FAILED_POSTING_SUBJECT);
    }

    #[tokio::test]
    async fn test_retry_abandons_when_posted_meanwhile() {
        let f = fixture();
        f.ledger.fail_next_publishes(1);
        f.publisher.publish_height(1).await.unwrap();

        // Some other process instance got it through
        f.ledger.insert_pending(DataFeed {
            bitcoin_hash: "hash1".to_string(),
            bitcoin_height: 1,
            bitcoin_merkle: None,
            random_value: 1,
        });

        wait_for_retries(&f.publisher).await;
        assert_eq!(f.ledger.feeds().len(), 1);
        assert_eq!(f.ledger.publish_count(), 0);
        assert!(f.publisher.tracker().in_flight().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_retry() {
        let f = fixture();
        f.ledger.fail_next_publishes(u32::MAX);
        f.publisher.publish_height(1).await.unwrap();
        assert_eq!(f.publisher.pending_retries(), 1);

        f._shutdown_tx.send(true).unwrap();
        wait_for_retries(&f.publisher).await;
        assert!(f.ledger.feeds().is_empty());
        // Hash stays claimed; only a durable fact may release it
        assert!(f.publisher.tracker().is_in_flight("hash1"));
    }

    #[tokio::test]
    async fn test_concurrent_publish_same_height() {
        let f = fixture();
        let (a, b) = tokio::join!(f.publisher.publish_height(2), f.publisher.publish_height(2));
        let outcomes = [a.unwrap(), b.unwrap()];

        assert_eq!(f.ledger.feeds().len(), 1);
        let published = outcomes
            .iter()
            .filter(|o| matches!(o, PublishOutcome::Published { .. }))
            .count();
        assert_eq!(published, 1);
        assert!(outcomes.iter().any(|o| matches!(
            o,
            PublishOutcome::AlreadyPublished { .. } | PublishOutcome::AlreadyInFlight { .. }
        )));
    }

    #[test]
    fn test_publish_state_display() {
        assert_eq!(PublishState::Checking.to_string(), "checking");
        assert_eq!(PublishState::Retrying.to_string(), "retrying");
    }
}
