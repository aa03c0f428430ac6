// rpc.rs
//
// Chain access. `ChainSource` is what the scan engine consumes; `RpcChainSource` implements it
// over the node's bitcoin-style JSON-RPC 1.0 interface.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::RpcSettings;
use crate::error::ChainError;
use crate::metrics;
use crate::types::{BlockInfo, RawTransaction};

#[async_trait]
pub trait ChainSource: Send + Sync {
    async fn height(&self) -> Result<u64, ChainError>;

    async fn block_hash(&self, height: u64) -> Result<String, ChainError>;

    async fn block(&self, hash: &str) -> Result<BlockInfo, ChainError>;

    /// Verbose (decoded) transaction.
    async fn transaction(&self, txid: &str) -> Result<RawTransaction, ChainError>;
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

/// Interpret a JSON-RPC response body. A non-null `error` wins over any `result`.
fn parse_response<T: DeserializeOwned>(method: &str, body: &str) -> Result<T, ChainError> {
    let malformed = |reason: String| ChainError::Malformed {
        method: method.to_string(),
        reason,
    };
    let response: RpcResponse = serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;
    if let Some(err) = response.error {
        return Err(ChainError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    serde_json::from_value(response.result).map_err(|e| malformed(e.to_string()))
}

fn error_type(err: &ChainError) -> &'static str {
    match err {
        ChainError::Transport(_) => "transport",
        ChainError::Rpc { .. } => "rpc",
        ChainError::Malformed { .. } => "malformed",
    }
}

pub struct RpcChainSource {
    client: reqwest::Client,
    url: String,
    user: String,
    password: String,
}

impl RpcChainSource {
    pub fn new(settings: &RpcSettings) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: settings.url.clone(),
            user: settings.user.clone(),
            password: settings.password.clone(),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ChainError> {
        let timer = metrics::Timer::new();
        let result = self.send(method, params).await;
        metrics::record_rpc_call_duration(method, timer.elapsed_secs());
        if let Err(e) = &result {
            metrics::increment_rpc_errors(method, error_type(e));
        }
        result
    }

    async fn send<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ChainError> {
        let body = self
            .client
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&json!({
                "jsonrpc": "1.0",
                "id": "twistindex",
                "method": method,
                "params": params
            }))
            .send()
            .await?
            .text()
            .await?;
        parse_response(method, &body)
    }

    /// Block until the node answers `getblockcount`, retrying every `retry`.
    pub async fn wait_for_node(&self, retry: Duration) -> u64 {
        loop {
            match self.height().await {
                Ok(height) => {
                    info!(rpc_height = height, url = %self.url, "RPC connection established");
                    return height;
                }
                Err(e) => {
                    warn!(error = %e, url = %self.url, retry_secs = retry.as_secs(), "Node not reachable yet");
                    tokio::time::sleep(retry).await;
                }
            }
        }
    }
}

#[async_trait]
impl ChainSource for RpcChainSource {
    async fn height(&self) -> Result<u64, ChainError> {
        self.call("getblockcount", json!([])).await
    }

    async fn block_hash(&self, height: u64) -> Result<String, ChainError> {
        self.call("getblockhash", json!([height])).await
    }

    async fn block(&self, hash: &str) -> Result<BlockInfo, ChainError> {
        self.call("getblock", json!([hash])).await
    }

    async fn transaction(&self, txid: &str) -> Result<RawTransaction, ChainError> {
        self.call("getrawtransaction", json!([txid, 1])).await
    }
}
