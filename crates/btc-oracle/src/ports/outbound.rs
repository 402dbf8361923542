//! # Outbound Ports
//!
//! Traits for external collaborators: the source chain, the target ledger,
//! the messaging transport and the operator channel.

use async_trait::async_trait;
use crate::domain::{DataFeed, IncomingTransaction, OracleError, RawBlock};

/// Source chain reader - outbound port.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Current chain tip height.
    async fn tip_height(&self) -> Result<u64, OracleError>;

    /// Block at `height`, flattened to its outputs.
    async fn block_at_height(&self, height: u64) -> Result<RawBlock, OracleError>;
}

/// Address history lookup - outbound port.
#[async_trait]
pub trait HistoryLookup: Send + Sync {
    /// Most recent confirmed transaction with a nonzero output to `address`.
    async fn incoming_transaction(
        &self,
        address: &str,
    ) -> Result<Option<IncomingTransaction>, OracleError>;
}

/// Ledger publishing client - outbound port.
///
/// Signs, composes and broadcasts one document. Failures are returned,
/// never panicked.
#[async_trait]
pub trait LedgerPublisher: Send + Sync {
    /// Post a data feed.
    async fn publish(&self, feed: &DataFeed) -> Result<(), OracleError>;
}

/// Durability queries against the ledger - outbound port.
#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// Has this oracle posted `key == value`?
    ///
    /// Must include facts that are accepted but not yet final, so a pending
    /// posting is never repeated.
    async fn fact_exists(&self, key: &str, value: &str) -> Result<bool, OracleError>;

    /// Most recent published `bitcoin_height` values, at most `limit`, in any order.
    async fn published_heights(&self, limit: usize) -> Result<Vec<u64>, OracleError>;

    /// Latest feed posted with `bitcoin_hash == block_hash`.
    async fn fact_by_hash(&self, block_hash: &str) -> Result<Option<DataFeed>, OracleError>;
}

/// Messaging transport - outbound port.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Deliver a text message to a correspondent.
    async fn send(&self, recipient: &str, text: &str) -> Result<(), OracleError>;
}

/// Operator notification channel - outbound port.
#[async_trait]
pub trait OperatorNotifier: Send + Sync {
    /// Alert the operator.
    async fn notify(&self, subject: &str, body: &str);
}
