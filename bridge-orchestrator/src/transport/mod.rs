//! Signing Transport
//!
//! The request interface the orchestrator, the provider chain and the bridge adapter
//! all speak: EIP-1193 style `request(method, params)`.

pub mod wallet;

pub use wallet::RpcWalletTransport;

use async_trait::async_trait;
use chain_clients_common::{parse_hex_u64, to_hex_quantity};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::ProviderError;

pub const ETH_SEND_TRANSACTION: &str = "eth_sendTransaction";
pub const WALLET_SWITCH_CHAIN: &str = "wallet_switchChain";
pub const WALLET_SWITCH_ETHEREUM_CHAIN: &str = "wallet_switchEthereumChain";
pub const WALLET_ADD_ETHEREUM_CHAIN: &str = "wallet_addEthereumChain";
pub const ETH_SEND_USER_OPERATION: &str = "eth_sendUserOperation";
pub const ETH_GET_USER_OPERATION_RECEIPT: &str = "eth_getUserOperationReceipt";

/// One JSON-RPC style request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// `eth_sendTransaction` with the transaction object as the only parameter.
    pub fn send_transaction(tx: Value) -> Self {
        Self::new(ETH_SEND_TRANSACTION, vec![tx])
    }

    /// `wallet_switchChain` to `chain_id`.
    pub fn switch_chain(chain_id: u64) -> Self {
        Self::new(
            WALLET_SWITCH_CHAIN,
            vec![json!({ "chainId": to_hex_quantity(chain_id) })],
        )
    }

    pub fn is_switch_chain(&self) -> bool {
        self.method == WALLET_SWITCH_CHAIN || self.method == WALLET_SWITCH_ETHEREUM_CHAIN
    }

    /// Chain id carried by a switch / add chain request.
    pub fn target_chain_id(&self) -> Option<u64> {
        self.params.first().and_then(|p| p.get("chainId")).and_then(parse_chain_id)
    }
}

/// Something that can sign and send on behalf of the user.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: RpcRequest) -> Result<Value, ProviderError>;
}

/// Parses a chain id given either as a hex quantity string or a JSON number.
pub fn parse_chain_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) if s.starts_with("0x") || s.starts_with("0X") => parse_hex_u64(s).ok(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Fields of an `eth_sendTransaction` object the orchestrator cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionFields {
    pub to: String,
    /// Hex call data (`data`, or `input` as some wallets name it)
    pub data: String,
    pub value: Option<String>,
    pub chain_id: Option<u64>,
}

impl TransactionFields {
    pub fn from_tx(tx: &Value) -> Result<Self, ProviderError> {
        let to = tx
            .get("to")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::InvalidRequest("transaction has no 'to' address".to_string()))?
            .to_string();
        let data = tx
            .get("data")
            .or_else(|| tx.get("input"))
            .and_then(Value::as_str)
            .unwrap_or("0x")
            .to_string();
        let value = tx.get("value").and_then(Value::as_str).map(str::to_string);
        let chain_id = tx.get("chainId").and_then(parse_chain_id);
        Ok(Self {
            to,
            data,
            value,
            chain_id,
        })
    }
}

/// Builds a transaction object for `eth_sendTransaction`.
pub fn build_tx(from: &str, to: &str, data: &[u8], chain_id: u64) -> Value {
    json!({
        "from": from,
        "to": to,
        "data": format!("0x{}", hex::encode(data)),
        "value": "0x0",
        "chainId": to_hex_quantity(chain_id),
    })
}

/// Extracts the transaction (or operation) hash from a send result.
pub fn result_hash(result: &Value) -> Result<String, ProviderError> {
    result
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ProviderError::Transport(format!("Unexpected send result: {}", result)))
}
