//! In-Memory Adapters
//!
//! Chain, history and ledger kept in process memory, with scripted
//! failures. Used by the test suites and for local dry runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::domain::{DataFeed, IncomingTransaction, OracleError, RawBlock};
use crate::ports::{ChainReader, HistoryLookup, LedgerPublisher, LedgerQuery, OperatorNotifier};

/// Consume one scripted failure, if any are left.
fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Source chain and address history held in memory.
#[derive(Debug, Default)]
pub struct InMemoryChain {
    blocks: RwLock<BTreeMap<u64, RawBlock>>,
    tip: Mutex<Option<u64>>,
    incoming: RwLock<HashMap<String, IncomingTransaction>>,
    read_failures: AtomicU32,
    lookup_failures: AtomicU32,
    block_reads: AtomicUsize,
}

impl InMemoryChain {
    /// Empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the block at its height.
    pub fn insert_block(&self, block: RawBlock) {
        self.blocks.write().insert(block.height, block);
    }

    /// Drop the block at `height`; reads of it fail afterwards.
    pub fn remove_block(&self, height: u64) -> Option<RawBlock> {
        self.blocks.write().remove(&height)
    }

    /// Pin the tip height. Without it the tip is the highest stored block.
    pub fn set_tip(&self, height: u64) {
        *self.tip.lock() = Some(height);
    }

    /// Set the most recent incoming transaction of `address`.
    pub fn record_incoming(&self, address: &str, tx: IncomingTransaction) {
        self.incoming.write().insert(address.to_string(), tx);
    }

    /// Make the next `n` block reads fail.
    pub fn fail_next_reads(&self, n: u32) {
        self.read_failures.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` history lookups fail.
    pub fn fail_next_lookups(&self, n: u32) {
        self.lookup_failures.store(n, Ordering::SeqCst);
    }

    /// Block reads served so far, failed ones included.
    pub fn block_reads(&self) -> usize {
        self.block_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainReader for InMemoryChain {
    async fn tip_height(&self) -> Result<u64, OracleError> {
        if let Some(tip) = *self.tip.lock() {
            return Ok(tip);
        }
        Ok(self.blocks.read().keys().next_back().copied().unwrap_or(0))
    }

    async fn block_at_height(&self, height: u64) -> Result<RawBlock, OracleError> {
        self.block_reads.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.read_failures) {
            return Err(OracleError::ChainRead(format!(
                "scripted failure reading block {}",
                height
            )));
        }
        self.blocks
            .read()
            .get(&height)
            .cloned()
            .ok_or_else(|| OracleError::ChainRead(format!("no block at height {}", height)))
    }
}

#[async_trait]
impl HistoryLookup for InMemoryChain {
    async fn incoming_transaction(
        &self,
        address: &str,
    ) -> Result<Option<IncomingTransaction>, OracleError> {
        if take_failure(&self.lookup_failures) {
            return Err(OracleError::History(format!(
                "scripted failure looking up {}",
                address
            )));
        }
        Ok(self.incoming.read().get(address).cloned())
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    /// Finalized feeds, oldest first.
    finalized: Vec<DataFeed>,
    /// Accepted feeds awaiting finality, oldest first.
    pending: Vec<DataFeed>,
}

impl LedgerState {
    /// All durable feeds, oldest first.
    fn all(&self) -> impl DoubleEndedIterator<Item = &DataFeed> {
        self.finalized.iter().chain(self.pending.iter())
    }
}

/// Target ledger held in memory.
///
/// Published feeds are accepted as pending; [`InMemoryLedger::finalize_pending`]
/// makes them final. Queries see both.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    publish_failures: AtomicU32,
    publishes: AtomicUsize,
}

impl InMemoryLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` publishes fail.
    pub fn fail_next_publishes(&self, n: u32) {
        self.publish_failures.store(n, Ordering::SeqCst);
    }

    /// Successful [`LedgerPublisher::publish`] calls.
    pub fn publish_count(&self) -> usize {
        self.publishes.load(Ordering::SeqCst)
    }

    /// Accept a feed without going through the publisher port, as if
    /// another process posted it.
    pub fn insert_pending(&self, feed: DataFeed) {
        self.state.lock().pending.push(feed);
    }

    /// Make every pending feed final.
    pub fn finalize_pending(&self) {
        let mut state = self.state.lock();
        let pending = std::mem::take(&mut state.pending);
        state.finalized.extend(pending);
    }

    /// Feeds accepted but not final.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Every durable feed, oldest first.
    pub fn feeds(&self) -> Vec<DataFeed> {
        self.state.lock().all().cloned().collect()
    }
}

#[async_trait]
impl LedgerPublisher for InMemoryLedger {
    async fn publish(&self, feed: &DataFeed) -> Result<(), OracleError> {
        if take_failure(&self.publish_failures) {
            return Err(OracleError::Publish(format!(
                "scripted failure posting block {}",
                feed.bitcoin_height
            )));
        }
        debug!("[oracle] Ledger accepted feed {:?}", feed.to_entries());
        self.state.lock().pending.push(feed.clone());
        self.publishes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl LedgerQuery for InMemoryLedger {
    async fn fact_exists(&self, key: &str, value: &str) -> Result<bool, OracleError> {
        Ok(self.state.lock().all().any(|f| f.has_entry(key, value)))
    }

    async fn published_heights(&self, limit: usize) -> Result<Vec<u64>, OracleError> {
        Ok(self
            .state
            .lock()
            .all()
            .rev()
            .take(limit)
            .map(|f| f.bitcoin_height)
            .collect())
    }

    async fn fact_by_hash(&self, block_hash: &str) -> Result<Option<DataFeed>, OracleError> {
        Ok(self
            .state
            .lock()
            .all()
            .rev()
            .find(|f| f.bitcoin_hash == block_hash)
            .cloned())
    }
}

/// Notifier that records every alert.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    alerts: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    /// No alerts yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of alerts received.
    pub fn count(&self) -> usize {
        self.alerts.lock().len()
    }

    /// Alert subjects, in order.
    pub fn subjects(&self) -> Vec<String> {
        self.alerts.lock().iter().map(|(s, _)| s.clone()).collect()
    }

    /// Alerts as `(subject, body)`, in order.
    pub fn alerts(&self) -> Vec<(String, String)> {
        self.alerts.lock().clone()
    }
}

#[async_trait]
impl OperatorNotifier for RecordingNotifier {
    async fn notify(&self, subject: &str, body: &str) {
        self.alerts
            .lock()
            .push((subject.to_string(), body.to_string()));
    }
}
