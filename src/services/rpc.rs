use crate::codec;
use anyhow::{Context, Result};
use ethers::types::U256;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Receipt fields the verifier needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptSummary {
    #[serde(default)]
    pub status: Option<String>,
}

impl ReceiptSummary {
    /// Post-Byzantium status flag: `0x1` means the transaction executed.
    pub fn succeeded(&self) -> bool {
        self.status
            .as_deref()
            .and_then(codec::hex_to_u256)
            .map(|status| status == U256::one())
            .unwrap_or(false)
    }
}

/// Transaction fields the verifier needs.
#[derive(Debug, Clone, Deserialize)]
pub struct TxSummary {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// JSON-RPC client that walks an ordered endpoint list per call.
///
/// `None` from any method means the answer is temporarily unknown (every
/// endpoint failed or the node has nothing yet), never that the object does
/// not exist on chain.
#[derive(Clone)]
pub struct RpcClient {
    http: reqwest::Client,
}

impl RpcClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build RPC HTTP client")?;
        Ok(Self { http })
    }

    pub async fn call(&self, endpoints: &[Url], method: &str, params: Value) -> Option<Value> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        for (index, endpoint) in endpoints.iter().enumerate() {
            let response = match self.http.post(endpoint.clone()).json(&payload).send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(endpoint_index = index, method, "RPC transport error");
                    tracing::debug!(endpoint = %endpoint, error = %e, "RPC transport error detail");
                    continue;
                }
            };

            let body: Value = match response.json().await {
                Ok(body) => body,
                Err(_) => {
                    tracing::warn!(endpoint_index = index, method, "RPC returned a non-JSON body");
                    continue;
                }
            };

            if !body.is_object() {
                tracing::warn!(endpoint_index = index, method, "RPC returned a malformed body");
                continue;
            }
            if body.get("error").is_some() {
                tracing::warn!(endpoint_index = index, method, "RPC returned an error member");
                continue;
            }

            tracing::debug!(endpoint_index = index, method, "RPC call succeeded");
            return body.get("result").filter(|result| !result.is_null()).cloned();
        }

        None
    }

    pub async fn transaction_receipt(
        &self,
        endpoints: &[Url],
        tx_hash: &str,
    ) -> Option<ReceiptSummary> {
        let result = self
            .call(endpoints, "eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        serde_json::from_value(result).ok()
    }

    pub async fn transaction_by_hash(&self, endpoints: &[Url], tx_hash: &str) -> Option<TxSummary> {
        let result = self
            .call(endpoints, "eth_getTransactionByHash", json!([tx_hash]))
            .await?;
        serde_json::from_value(result).ok()
    }

    pub async fn chain_id(&self, endpoints: &[Url]) -> Option<u64> {
        let result = self.call(endpoints, "eth_chainId", json!([])).await?;
        let chain_id = codec::hex_to_u256(result.as_str()?)?;
        (chain_id <= U256::from(u64::MAX)).then(|| chain_id.as_u64())
    }
}
