//! Bitcoin Core RPC Adapter
//!
//! Implements `ChainReader` over bitcoind's JSON-RPC 1.0 interface:
//! `getblockcount`, `getblockhash` and `getblock <hash> 2`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::json_rpc::JsonRpcClient;
use crate::domain::{OracleError, RawBlock, RawOutput, Satoshis};
use crate::ports::ChainReader;

/// Script type bitcoind reports for `OP_RETURN` outputs.
const NULLDATA_SCRIPT_TYPE: &str = "nulldata";

/// `getblock` with verbosity 2.
#[derive(Debug, Deserialize)]
pub struct RpcBlock {
    /// Block hash
    pub hash: String,
    /// Transactions with decoded outputs
    #[serde(default)]
    pub tx: Vec<RpcTransaction>,
}

/// Decoded transaction inside [`RpcBlock`].
#[derive(Debug, Deserialize)]
pub struct RpcTransaction {
    /// Transaction id
    pub txid: String,
    /// Outputs
    #[serde(default)]
    pub vout: Vec<RpcOutput>,
}

/// Decoded output.
#[derive(Debug, Deserialize)]
pub struct RpcOutput {
    /// Value in BTC
    pub value: f64,
    /// Output script
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: RpcScriptPubKey,
}

/// Decoded output script.
#[derive(Debug, Deserialize)]
pub struct RpcScriptPubKey {
    /// Script type (`pubkeyhash`, `nulldata`, ...)
    #[serde(rename = "type", default)]
    pub script_type: String,
    /// Address (bitcoind 22+)
    pub address: Option<String>,
    /// Addresses (older bitcoind)
    #[serde(default)]
    pub addresses: Vec<String>,
}

impl RpcBlock {
    /// Flatten to a [`RawBlock`].
    pub fn into_raw_block(self, height: u64) -> Result<RawBlock, OracleError> {
        let mut outputs = Vec::new();
        for tx in self.tx {
            for out in tx.vout {
                let amount = Satoshis::from_btc(out.value).ok_or_else(|| {
                    OracleError::ChainRead(format!("bad amount {} in tx {}", out.value, tx.txid))
                })?;
                let script = out.script_pub_key;
                let address = script
                    .address
                    .or_else(|| script.addresses.into_iter().next());
                outputs.push(RawOutput {
                    address,
                    amount,
                    is_data_carrier: script.script_type == NULLDATA_SCRIPT_TYPE,
                });
            }
        }
        Ok(RawBlock {
            height,
            hash: self.hash,
            outputs,
        })
    }
}

/// bitcoind JSON-RPC client.
pub struct BitcoinRpcClient {
    rpc: JsonRpcClient,
}

impl BitcoinRpcClient {
    /// Client for `rpc_url`, optionally with basic auth.
    pub fn new(rpc_url: String, user: Option<String>, password: Option<String>) -> Self {
        Self {
            rpc: JsonRpcClient::new(rpc_url, "1.0", Duration::from_secs(30))
                .with_basic_auth(user, password),
        }
    }

    async fn call<R: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<R, OracleError> {
        self.rpc.call(method, params).await.map_err(OracleError::ChainRead)
    }
}

#[async_trait]
impl ChainReader for BitcoinRpcClient {
    async fn tip_height(&self) -> Result<u64, OracleError> {
        self.call("getblockcount", json!([])).await
    }

    async fn block_at_height(&self, height: u64) -> Result<RawBlock, OracleError> {
        let hash: String = self.call("getblockhash", json!([height])).await?;
        let block: RpcBlock = self.call("getblock", json!([hash, 2])).await?;
        block.into_raw_block(height)
    }
}
