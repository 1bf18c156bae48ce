//! Bridge Protocol Adapter
//!
//! The orchestrator drives cross-chain transfers through a [`BridgeAdapter`], which
//! performs approve -> burn -> wait for attestation -> mint and calls back into the
//! run's transport for every on-chain action.

pub mod attestation;
pub mod cctp;
pub mod receipts;

pub use attestation::AttestationClient;
pub use cctp::{CctpAdapter, CctpSettings};
pub use receipts::{ReceiptStatus, ReceiptWatcher};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::chains::ChainDescriptor;
use crate::errors::AdapterError;
use crate::transport::Transport;

/// Everything the adapter needs to move funds for one run.
#[derive(Debug, Clone)]
pub struct BridgeParams {
    pub source: ChainDescriptor,
    pub destination: ChainDescriptor,
    /// Decimal amount as entered by the user
    pub amount: String,
    /// Account that signs the source-chain steps
    pub owner: String,
    /// Account receiving the minted funds on the destination chain
    pub recipient: String,
}

/// State of a step or of the whole adapter run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterState {
    Success,
    Error,
    Pending,
}

/// One step as reported by the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterStep {
    /// Adapter's own step name, e.g. "approve", "burn", "fetchAttestation", "mint"
    pub name: String,
    pub state: AdapterState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AdapterStep {
    pub fn success(name: &str, tx_hash: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            state: AdapterState::Success,
            tx_hash,
            error_message: None,
        }
    }

    pub fn error(name: &str, tx_hash: Option<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            state: AdapterState::Error,
            tx_hash,
            error_message: Some(message.into()),
        }
    }
}

/// What an adapter run reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterResult {
    Steps {
        state: AdapterState,
        steps: Vec<AdapterStep>,
        source_transaction_hash: Option<String>,
    },
    /// Opaque success token, treated as the source transaction hash
    Token(String),
}

#[async_trait]
pub trait BridgeAdapter: Send + Sync {
    async fn execute(
        &self,
        params: BridgeParams,
        transport: Arc<dyn Transport>,
    ) -> Result<AdapterResult, AdapterError>;
}
