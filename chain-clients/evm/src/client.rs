//! EVM Client Module
//!
//! Client for communicating with EVM-compatible nodes via their JSON-RPC API.
//! The same client speaks to bundler endpoints, which expose JSON-RPC as well.

use anyhow::{Context, Result};
use chain_clients_common::{ensure_0x, parse_hex_u64, strip_0x};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::function_selector;

// ============================================================================
// API RESPONSE STRUCTURES
// ============================================================================

/// EVM JSON-RPC request wrapper
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<serde_json::Value>,
    id: u64,
}

/// EVM JSON-RPC response wrapper
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    #[allow(dead_code)]
    jsonrpc: String,
    result: Option<T>,
    error: Option<JsonRpcError>,
    #[allow(dead_code)]
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Error object returned by a JSON-RPC endpoint.
///
/// Carried inside the `anyhow::Error` returned by [`EvmClient::request`] so callers
/// can recover the numeric code with `downcast_ref::<RpcError>()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    /// Endpoint that returned the error
    pub endpoint: String,
    /// JSON-RPC method that failed
    pub method: String,
    pub code: i64,
    pub message: String,
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "JSON-RPC error from {} ({}): {} (code: {})",
            self.endpoint, self.method, self.message, self.code
        )
    }
}

impl std::error::Error for RpcError {}

/// EVM event log entry
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvmLog {
    /// Address of the contract that emitted the event
    pub address: String,
    /// Array of topics (indexed event parameters)
    pub topics: Vec<String>,
    /// Event data (non-indexed parameters)
    pub data: String,
}

/// Transaction receipt subset
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvmReceipt {
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
    #[serde(rename = "blockNumber", default)]
    pub block_number: Option<String>,
    /// "0x1" = success, "0x0" = reverted
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub logs: Vec<EvmLog>,
}

impl EvmReceipt {
    /// Whether the transaction executed successfully
    pub fn is_success(&self) -> bool {
        matches!(self.status.as_deref(), Some("0x1") | Some("0x01"))
    }

    /// Logs whose first topic equals `topic0` (case-insensitive)
    pub fn logs_with_topic<'a>(&'a self, topic0: &'a str) -> impl Iterator<Item = &'a EvmLog> + 'a {
        self.logs.iter().filter(move |log| {
            log.topics
                .first()
                .map(|t| t.eq_ignore_ascii_case(topic0))
                .unwrap_or(false)
        })
    }
}

// ============================================================================
// EVM CLIENT IMPLEMENTATION
// ============================================================================

/// Client for communicating with EVM-compatible nodes (or bundlers) via JSON-RPC
#[derive(Debug, Clone)]
pub struct EvmClient {
    /// HTTP client for making requests
    client: Client,
    /// Endpoint URL (e.g., "http://127.0.0.1:8545")
    base_url: String,
}

impl EvmClient {
    /// Creates a new EVM client for the given endpoint
    ///
    /// # Arguments
    ///
    /// * `rpc_url` - JSON-RPC endpoint URL
    ///
    /// # Returns
    ///
    /// * `Ok(EvmClient)` - Successfully created client
    /// * `Err(anyhow::Error)` - Failed to create client
    pub fn new(rpc_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .no_proxy()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: rpc_url.to_string(),
        })
    }

    /// Sends a JSON-RPC request and returns the (possibly null) result.
    ///
    /// JSON-RPC errors are returned as `Err` with the node's message and code.
    pub async fn request_optional<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<Option<T>> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: 1,
        };

        debug!("Sending {} request to {}", method, self.base_url);

        let response: JsonRpcResponse<T> = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request to {}", method, self.base_url))?
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response from {}", method, self.base_url))?;

        if let Some(error) = response.error {
            return Err(RpcError {
                endpoint: self.base_url.clone(),
                method: method.to_string(),
                code: error.code,
                message: error.message,
            }
            .into());
        }

        Ok(response.result)
    }

    /// Sends a JSON-RPC request that must return a non-null result.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<T> {
        self.request_optional(method, params)
            .await?
            .ok_or_else(|| anyhow::anyhow!("No result in {} response from {}", method, self.base_url))
    }

    /// Gets the transaction count (nonce) for an address at the given block tag
    ///
    /// # Arguments
    ///
    /// * `address` - Account address
    /// * `block_tag` - "latest" or "pending"
    pub async fn get_transaction_count(&self, address: &str, block_tag: &str) -> Result<u64> {
        let nonce_hex: String = self
            .request(
                "eth_getTransactionCount",
                vec![serde_json::json!(address), serde_json::json!(block_tag)],
            )
            .await?;
        parse_hex_u64(&nonce_hex).context("Failed to parse transaction count")
    }

    /// Executes a read-only call against the latest block and returns the raw return data
    pub async fn call(&self, to: &str, data: &[u8]) -> Result<Vec<u8>> {
        let call = serde_json::json!({
            "to": to,
            "data": format!("0x{}", hex::encode(data)),
        });
        let result: String = self
            .request("eth_call", vec![call, serde_json::json!("latest")])
            .await?;
        hex::decode(strip_0x(&result)).context("Failed to decode eth_call result")
    }

    /// Reads `decimals()` on an ERC-20 token
    pub async fn erc20_decimals(&self, token: &str) -> Result<u8> {
        let data = function_selector("decimals()").to_vec();
        let output = self.call(token, &data).await?;
        decode_u8_word(&output).context("Failed to decode decimals result")
    }

    /// Queries a transaction receipt by hash
    ///
    /// # Returns
    ///
    /// * `Ok(Some(EvmReceipt))` - Transaction is mined
    /// * `Ok(None)` - Pending or unknown
    /// * `Err(anyhow::Error)` - Failed to query
    pub async fn get_transaction_receipt(&self, hash: &str) -> Result<Option<EvmReceipt>> {
        self.request_optional(
            "eth_getTransactionReceipt",
            vec![serde_json::json!(ensure_0x(hash))],
        )
        .await
    }
}

/// Decodes the first 32-byte word of return data as a uint8
fn decode_u8_word(output: &[u8]) -> Result<u8> {
    if output.len() < 32 {
        anyhow::bail!("Return data too short: {} bytes", output.len());
    }
    if output[..31].iter().any(|b| *b != 0) {
        anyhow::bail!("Value does not fit in uint8");
    }
    Ok(output[31])
}
