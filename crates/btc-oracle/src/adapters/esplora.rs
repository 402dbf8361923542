//! Esplora History Adapter
//!
//! Implements `HistoryLookup` over an Esplora REST API
//! (`/address/<addr>/txs`, `/blocks/tip/height`).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::domain::{IncomingTransaction, OracleError, RawOutput, Satoshis};
use crate::ports::HistoryLookup;

/// Transaction as listed by `/address/<addr>/txs`.
#[derive(Debug, Deserialize)]
pub struct EsploraTx {
    /// Transaction id
    pub txid: String,
    /// Confirmation status
    pub status: EsploraStatus,
    /// Outputs
    #[serde(default)]
    pub vout: Vec<EsploraOutput>,
}

/// Confirmation status of an [`EsploraTx`].
#[derive(Debug, Deserialize)]
pub struct EsploraStatus {
    /// Included in a block?
    pub confirmed: bool,
    /// Height of the containing block
    pub block_height: Option<u64>,
    /// Hash of the containing block
    pub block_hash: Option<String>,
}

/// Output of an [`EsploraTx`], value in satoshis.
#[derive(Debug, Deserialize)]
pub struct EsploraOutput {
    /// Destination address, absent for non-standard scripts
    pub scriptpubkey_address: Option<String>,
    /// Script type (`p2pkh`, `op_return`, ...)
    #[serde(default)]
    pub scriptpubkey_type: String,
    /// Value in satoshis
    pub value: u64,
}

impl EsploraOutput {
    fn into_raw_output(self) -> RawOutput {
        RawOutput {
            address: self.scriptpubkey_address,
            amount: Satoshis(self.value),
            is_data_carrier: self.scriptpubkey_type == "op_return",
        }
    }
}

/// Most recent transaction paying `address` a nonzero amount with at least
/// `min_confirmations` at `tip`.
///
/// Esplora lists newest first, so the first match wins.
pub fn select_incoming(
    txs: Vec<EsploraTx>,
    address: &str,
    tip: u64,
    min_confirmations: u64,
) -> Option<IncomingTransaction> {
    txs.into_iter().find_map(|tx| {
        if !tx.status.confirmed {
            return None;
        }
        let height = tx.status.block_height?;
        let block_hash = tx.status.block_hash?;
        if tip + 1 < height + min_confirmations {
            return None;
        }
        let pays = tx
            .vout
            .iter()
            .any(|o| o.value > 0 && o.scriptpubkey_address.as_deref() == Some(address));
        if !pays {
            return None;
        }
        Some(IncomingTransaction {
            txid: tx.txid,
            height,
            block_hash,
            outputs: tx.vout.into_iter().map(EsploraOutput::into_raw_output).collect(),
        })
    })
}

/// Esplora REST client.
pub struct EsploraHistory {
    http_client: reqwest::Client,
    base_url: String,
    min_confirmations: u64,
}

impl EsploraHistory {
    /// Client for `base_url` (e.g. `https://blockstream.info/api`).
    pub fn new(base_url: String, min_confirmations: u64) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            min_confirmations,
        }
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, OracleError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("[oracle] GET {}", url);
        self.http_client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| OracleError::History(format!("GET {} failed: {}", url, e)))
    }

    async fn tip_height(&self) -> Result<u64, OracleError> {
        let text = self
            .get("/blocks/tip/height")
            .await?
            .text()
            .await
            .map_err(|e| OracleError::History(e.to_string()))?;
        text.trim()
            .parse()
            .map_err(|_| OracleError::History(format!("bad tip height {:?}", text)))
    }
}

#[async_trait]
impl HistoryLookup for EsploraHistory {
    async fn incoming_transaction(
        &self,
        address: &str,
    ) -> Result<Option<IncomingTransaction>, OracleError> {
        let tip = self.tip_height().await?;
        let txs: Vec<EsploraTx> = self
            .get(&format!("/address/{}/txs", address))
            .await?
            .json()
            .await
            .map_err(|e| OracleError::History(format!("bad history for {}: {}", address, e)))?;
        Ok(select_incoming(txs, address, tip, self.min_confirmations))
    }
}
