//! Ledger RPC Adapter
//!
//! `LedgerPublisher` + `LedgerQuery` against a ledger wallet exposing
//! JSON-RPC 2.0. The wallet signs, composes and broadcasts; this side only
//! sends feed entries and asks about facts it posted.
//!
//! | Method | Params | Result |
//! |--------|--------|--------|
//! | `post_data_feed` | `[{entries}]` | unit id |
//! | `data_feed_exists` | `{feed_name, value, include_unstable}` | `bool` |
//! | `data_feed_values` | `{feed_name, limit}` | `[value]`, newest first |
//! | `data_feed_by_value` | `{feed_name, value}` | `{entries}` or `null` |

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::info;

use super::json_rpc::JsonRpcClient;
use crate::domain::{
    DataFeed, OracleError, BLOCK_HASH_FEED_NAME, BLOCK_HEIGHT_FEED_NAME, MERKLE_ROOT_FEED_NAME,
};
use crate::ports::{LedgerPublisher, LedgerQuery};

/// Numeric feed value; wallets may return numbers or numeric strings.
fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Rebuild a [`DataFeed`] from the entries of a posted document.
pub fn feed_from_entries(entries: &Map<String, Value>) -> Option<DataFeed> {
    let bitcoin_hash = entries.get(BLOCK_HASH_FEED_NAME)?.as_str()?.to_string();
    let bitcoin_height = as_u64(entries.get(BLOCK_HEIGHT_FEED_NAME)?)?;
    let bitcoin_merkle = entries
        .get(MERKLE_ROOT_FEED_NAME)
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut feed = DataFeed {
        bitcoin_hash,
        bitcoin_height,
        bitcoin_merkle,
        random_value: 0,
    };
    let random = entries.get(&feed.random_feed_name()).and_then(as_u64)?;
    feed.random_value = u32::try_from(random).ok()?;
    Some(feed)
}

/// Ledger wallet JSON-RPC client.
pub struct LedgerRpcClient {
    rpc: JsonRpcClient,
}

impl LedgerRpcClient {
    /// Client for the wallet at `url`.
    pub fn new(url: String) -> Self {
        Self {
            rpc: JsonRpcClient::new(url, "2.0", Duration::from_secs(60)),
        }
    }
}

#[async_trait]
impl LedgerPublisher for LedgerRpcClient {
    async fn publish(&self, feed: &DataFeed) -> Result<(), OracleError> {
        let unit: Value = self
            .rpc
            .call("post_data_feed", json!([feed.to_entries()]))
            .await
            .map_err(OracleError::Publish)?;
        info!(
            "[oracle] Ledger accepted block {} as unit {}",
            feed.bitcoin_height, unit
        );
        Ok(())
    }
}

#[async_trait]
impl LedgerQuery for LedgerRpcClient {
    async fn fact_exists(&self, key: &str, value: &str) -> Result<bool, OracleError> {
        self.rpc
            .call(
                "data_feed_exists",
                json!({"feed_name": key, "value": value, "include_unstable": true}),
            )
            .await
            .map_err(OracleError::LedgerQuery)
    }

    async fn published_heights(&self, limit: usize) -> Result<Vec<u64>, OracleError> {
        let values: Vec<Value> = self
            .rpc
            .call(
                "data_feed_values",
                json!({"feed_name": BLOCK_HEIGHT_FEED_NAME, "limit": limit}),
            )
            .await
            .map_err(OracleError::LedgerQuery)?;
        values
            .iter()
            .map(|v| {
                as_u64(v).ok_or_else(|| {
                    OracleError::LedgerQuery(format!("bad {} value {}", BLOCK_HEIGHT_FEED_NAME, v))
                })
            })
            .collect()
    }

    async fn fact_by_hash(&self, block_hash: &str) -> Result<Option<DataFeed>, OracleError> {
        // `null` when nothing was posted for this block
        let entries: Option<Map<String, Value>> = self
            .rpc
            .call_optional(
                "data_feed_by_value",
                json!({"feed_name": BLOCK_HASH_FEED_NAME, "value": block_hash}),
            )
            .await
            .map_err(OracleError::LedgerQuery)?;
        match entries {
            None => Ok(None),
            Some(entries) => feed_from_entries(&entries).map(Some).ok_or_else(|| {
                OracleError::LedgerQuery(format!("malformed feed for block {}", block_hash))
            }),
        }
    }
}
