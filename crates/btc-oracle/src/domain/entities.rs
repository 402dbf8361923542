//! # Domain Entities
//!
//! Raw chain data as read from collaborators, the block summary the oracle
//! derives from it, and the data feed posted to the ledger.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::invariants::{
    BLOCK_HASH_FEED_NAME, BLOCK_HEIGHT_FEED_NAME, MERKLE_ROOT_FEED_NAME, RANDOM_FEED_PREFIX,
};
use super::value_objects::Satoshis;

/// One transaction output of a source-chain block.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawOutput {
    /// Destination address, absent for multisig and non-standard scripts.
    pub address: Option<String>,
    /// Output value.
    pub amount: Satoshis,
    /// `OP_RETURN` data carrier output.
    pub is_data_carrier: bool,
}

impl RawOutput {
    /// Output paying a plain address.
    pub fn to_address(address: impl Into<String>, amount: Satoshis) -> Self {
        Self {
            address: Some(address.into()),
            amount,
            is_data_carrier: false,
        }
    }

    /// Zero-value data carrier output.
    pub fn data_carrier() -> Self {
        Self {
            address: None,
            amount: Satoshis::ZERO,
            is_data_carrier: true,
        }
    }

    /// Output whose script has no single address (bare multisig etc).
    pub fn without_address(amount: Satoshis) -> Self {
        Self {
            address: None,
            amount,
            is_data_carrier: false,
        }
    }
}

/// A source-chain block, flattened to its outputs.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawBlock {
    /// Block height.
    pub height: u64,
    /// Block hash (hex), empty if the reader could not determine it.
    pub hash: String,
    /// Outputs of every transaction, in block order.
    pub outputs: Vec<RawOutput>,
}

/// Most recent confirmed transaction paying an address.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncomingTransaction {
    /// Transaction id.
    pub txid: String,
    /// Height of the containing block.
    pub height: u64,
    /// Hash of the containing block.
    pub block_hash: String,
    /// All outputs of the transaction.
    pub outputs: Vec<RawOutput>,
}

/// Condensed summary of one confirmed block.
///
/// Created once per height and never mutated; it can always be rebuilt
/// from the chain for proof serving.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockSummary {
    /// Block height.
    pub height: u64,
    /// Block hash.
    pub hash: String,
    /// Canonical leaf set.
    pub elements: Vec<String>,
    /// Hex merkle root, absent when the block has no leaves.
    pub merkle_root: Option<String>,
    /// Random value in `[1, 100000]` derived from the hash.
    pub random_value: u32,
}

/// Document posted to the ledger for one block.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataFeed {
    /// `bitcoin_hash`
    pub bitcoin_hash: String,
    /// `bitcoin_height`
    pub bitcoin_height: u64,
    /// `bitcoin_merkle`, omitted for blocks without leaves
    pub bitcoin_merkle: Option<String>,
    /// Value of `random<height>`
    pub random_value: u32,
}

impl DataFeed {
    /// Name of the random feed for this height.
    pub fn random_feed_name(&self) -> String {
        format!("{}{}", RANDOM_FEED_PREFIX, self.bitcoin_height)
    }

    /// Key/value entries as they appear on the ledger.
    pub fn to_entries(&self) -> Map<String, Value> {
        let mut entries = Map::new();
        entries.insert(
            BLOCK_HASH_FEED_NAME.to_string(),
            Value::from(self.bitcoin_hash.clone()),
        );
        entries.insert(
            BLOCK_HEIGHT_FEED_NAME.to_string(),
            Value::from(self.bitcoin_height),
        );
        if let Some(root) = &self.bitcoin_merkle {
            entries.insert(MERKLE_ROOT_FEED_NAME.to_string(), Value::from(root.clone()));
        }
        entries.insert(self.random_feed_name(), Value::from(self.random_value));
        entries
    }

    /// Does this feed carry `key == value`?
    pub fn has_entry(&self, key: &str, value: &str) -> bool {
        match key {
            BLOCK_HASH_FEED_NAME => self.bitcoin_hash == value,
            BLOCK_HEIGHT_FEED_NAME => self.bitcoin_height.to_string() == value,
            MERKLE_ROOT_FEED_NAME => self.bitcoin_merkle.as_deref() == Some(value),
            other => {
                other == self.random_feed_name() && self.random_value.to_string() == value
            }
        }
    }
}

impl From<&BlockSummary> for DataFeed {
    fn from(summary: &BlockSummary) -> Self {
        Self {
            bitcoin_hash: summary.hash.clone(),
            bitcoin_height: summary.height,
            bitcoin_merkle: summary.merkle_root.clone(),
            random_value: summary.random_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_summary(merkle_root: Option<&str>) -> BlockSummary {
        BlockSummary {
            height: 100,
            hash: "00000000abc".to_string(),
            elements: vec![],
            merkle_root: merkle_root.map(str::to_string),
            random_value: 4242,
        }
    }

    #[test]
    fn test_data_feed_entries_with_root() {
        let feed = DataFeed::from(&sample_summary(Some("deadbeef")));
        let entries = feed.to_entries();
        assert_eq!(entries["bitcoin_hash"], "00000000abc");
        assert_eq!(entries["bitcoin_height"], 100);
        assert_eq!(entries["bitcoin_merkle"], "deadbeef");
        assert_eq!(entries["random100"], 4242);
        assert_eq!(entries.len(), 4);
    }

    #[test]
    fn test_data_feed_entries_without_root() {
        let feed = DataFeed::from(&sample_summary(None));
        let entries = feed.to_entries();
        assert!(!entries.contains_key("bitcoin_merkle"));
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn test_data_feed_has_entry() {
        let feed = DataFeed::from(&sample_summary(Some("deadbeef")));
        assert!(feed.has_entry("bitcoin_hash", "00000000abc"));
        assert!(feed.has_entry("bitcoin_height", "100"));
        assert!(feed.has_entry("bitcoin_merkle", "deadbeef"));
        assert!(feed.has_entry("random100", "4242"));
        assert!(!feed.has_entry("random101", "4242"));
        assert!(!feed.has_entry("bitcoin_hash", "other"));
    }

    #[test]
    fn test_raw_output_constructors() {
        let out = RawOutput::to_address("1abc", Satoshis(5));
        assert_eq!(out.address.as_deref(), Some("1abc"));
        assert!(!out.is_data_carrier);

        let op_return = RawOutput::data_carrier();
        assert!(op_return.amount.is_zero());
        assert!(op_return.is_data_carrier);

        let multisig = RawOutput::without_address(Satoshis(10));
        assert!(multisig.address.is_none());
    }
}
