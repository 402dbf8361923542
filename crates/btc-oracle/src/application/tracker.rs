//! # Publication Tracker
//!
//! Decides whether a block hash still needs posting: a process-local
//! in-flight set plus the durable record on the ledger.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::{OracleError, BLOCK_HASH_FEED_NAME};
use crate::ports::LedgerQuery;

/// Block hashes whose publication is currently being attempted.
///
/// Rebuildable from the ledger on restart, so it is never persisted.
#[derive(Debug, Default)]
pub struct InFlightSet {
    hashes: Mutex<HashSet<String>>,
}

impl InFlightSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Is `hash` being published?
    pub fn contains(&self, hash: &str) -> bool {
        self.hashes.lock().contains(hash)
    }

    /// Insert `hash`; `false` if it was already present.
    pub fn try_insert(&self, hash: &str) -> bool {
        self.hashes.lock().insert(hash.to_string())
    }

    /// Remove `hash`; `false` if it was absent.
    pub fn remove(&self, hash: &str) -> bool {
        self.hashes.lock().remove(hash)
    }

    /// Number of hashes in flight.
    pub fn len(&self) -> usize {
        self.hashes.lock().len()
    }

    /// Nothing in flight?
    pub fn is_empty(&self) -> bool {
        self.hashes.lock().is_empty()
    }
}

/// In-flight set + durability query.
#[derive(Clone)]
pub struct PublicationTracker {
    in_flight: Arc<InFlightSet>,
    ledger: Arc<dyn LedgerQuery>,
}

impl PublicationTracker {
    /// Create a tracker over an injected in-flight set.
    pub fn new(in_flight: Arc<InFlightSet>, ledger: Arc<dyn LedgerQuery>) -> Self {
        Self { in_flight, ledger }
    }

    /// Shared in-flight set.
    pub fn in_flight(&self) -> &Arc<InFlightSet> {
        &self.in_flight
    }

    /// Is a publication of `hash` already running?
    pub fn is_in_flight(&self, hash: &str) -> bool {
        self.in_flight.contains(hash)
    }

    /// Is a feed with `bitcoin_hash == hash` durable (final or accepted)?
    pub async fn is_published(&self, hash: &str) -> Result<bool, OracleError> {
        self.ledger.fact_exists(BLOCK_HASH_FEED_NAME, hash).await
    }

    /// Claim `hash` for publication. `false` if another attempt holds it.
    pub fn begin(&self, hash: &str) -> bool {
        self.in_flight.try_insert(hash)
    }

    /// Release `hash` after success or confirmed abandonment.
    pub fn finish(&self, hash: &str) {
        self.in_flight.remove(hash);
    }
}
