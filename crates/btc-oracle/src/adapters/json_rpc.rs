//! JSON-RPC over HTTP, shared by the bitcoind and ledger clients.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Serialize)]
pub(crate) struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcResponse {
    #[serde(default)]
    pub result: Value,
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Error member first, then the result; `null` decodes to `None`.
    fn into_result<R: DeserializeOwned>(self, method: &str) -> Result<Option<R>, String> {
        if let Some(error) = self.error {
            return Err(format!("{} error {}: {}", method, error.code, error.message));
        }
        if self.result.is_null() {
            return Ok(None);
        }
        serde_json::from_value(self.result)
            .map(Some)
            .map_err(|e| format!("{} bad result: {}", method, e))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// Endpoint, protocol version and optional basic auth.
pub(crate) struct JsonRpcClient {
    http_client: reqwest::Client,
    url: String,
    version: &'static str,
    credentials: Option<(String, Option<String>)>,
    request_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: String, version: &'static str, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http_client,
            url,
            version,
            credentials: None,
            request_id: AtomicU64::new(1),
        }
    }

    pub fn with_basic_auth(mut self, user: Option<String>, password: Option<String>) -> Self {
        self.credentials = user.map(|u| (u, password));
        self
    }

    /// Call `method`, which must return a non-null result. Errors come back
    /// as plain text for the caller to wrap in its own error variant.
    pub async fn call<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R, String> {
        self.call_optional(method, params)
            .await?
            .ok_or_else(|| format!("{} returned no result", method))
    }

    /// Call `method` where a `null` result means "nothing there".
    pub async fn call_optional<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<R>, String> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: self.version,
            id,
            method,
            params,
        };
        debug!("[oracle] RPC {} #{} -> {}", method, id, self.url);

        let mut builder = self.http_client.post(&self.url).json(&request);
        if let Some((user, password)) = &self.credentials {
            builder = builder.basic_auth(user, password.as_ref());
        }

        // bitcoind answers RPC errors with HTTP 500 and a JSON body, so the
        // status code is not checked before parsing
        let response: JsonRpcResponse = builder
            .send()
            .await
            .map_err(|e| format!("{} request failed: {}", method, e))?
            .json()
            .await
            .map_err(|e| format!("{} bad response: {}", method, e))?;

        response.into_result(method)
    }
}
