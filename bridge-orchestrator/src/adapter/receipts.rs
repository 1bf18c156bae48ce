//! Receipt waiting for submitted steps.
//!
//! A step hash is either a transaction hash (unsponsored) or a user operation hash
//! (sponsored). The chain RPC is asked first; when it does not know the hash and
//! the chain has a bundler, the bundler's user operation receipt is used instead.

use anyhow::Result;
use chain_clients_evm::{EvmClient, EvmReceipt};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::chains::ChainDescriptor;
use crate::transport::ETH_GET_USER_OPERATION_RECEIPT;

/// Bundler receipt of a user operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationReceipt {
    pub success: bool,
    #[serde(default)]
    pub reason: Option<String>,
    /// Receipt of the bundle transaction that included the operation
    pub receipt: EvmReceipt,
}

/// State of a submitted hash at one point in time.
#[derive(Debug)]
pub enum ReceiptStatus {
    Pending,
    Mined(EvmReceipt),
    Failed(String),
}

/// Clients for polling receipts on one chain.
pub struct ReceiptWatcher {
    public: EvmClient,
    bundler: Option<EvmClient>,
    timeout: Duration,
    poll_interval: Duration,
}

impl ReceiptWatcher {
    pub fn new(chain: &ChainDescriptor, timeout: Duration, poll_interval: Duration) -> Result<Self> {
        let bundler = match &chain.bundler_url {
            Some(url) => Some(EvmClient::new(url)?),
            None => None,
        };
        Ok(Self {
            public: EvmClient::new(&chain.rpc_url)?,
            bundler,
            timeout,
            poll_interval,
        })
    }

    async fn poll_once(&self, hash: &str) -> Result<ReceiptStatus> {
        if let Some(receipt) = self.public.get_transaction_receipt(hash).await? {
            if !receipt.is_success() {
                return Ok(ReceiptStatus::Failed(format!(
                    "Transaction {} reverted",
                    receipt.transaction_hash
                )));
            }
            return Ok(ReceiptStatus::Mined(receipt));
        }

        let Some(bundler) = &self.bundler else {
            return Ok(ReceiptStatus::Pending);
        };
        let op_receipt: Option<UserOperationReceipt> = bundler
            .request_optional(ETH_GET_USER_OPERATION_RECEIPT, vec![serde_json::json!(hash)])
            .await?;
        Ok(match op_receipt {
            Some(op) if !op.success => ReceiptStatus::Failed(format!(
                "Sponsored operation {} failed: {}",
                hash,
                op.reason.unwrap_or_else(|| "execution reverted".to_string())
            )),
            Some(op) => ReceiptStatus::Mined(op.receipt),
            None => ReceiptStatus::Pending,
        })
    }

    /// Checks `hash` once without waiting.
    pub async fn check(&self, hash: &str) -> Result<ReceiptStatus> {
        self.poll_once(hash).await
    }

    /// Waits until `hash` is mined successfully.
    ///
    /// Fails on revert or when the timeout elapses; transient RPC errors are retried.
    pub async fn wait(&self, hash: &str) -> Result<EvmReceipt> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match self.poll_once(hash).await {
                Ok(ReceiptStatus::Mined(receipt)) => return Ok(receipt),
                Ok(ReceiptStatus::Failed(reason)) => anyhow::bail!(reason),
                Ok(ReceiptStatus::Pending) => debug!("Receipt for {} not available yet", hash),
                Err(e) => warn!("Receipt poll for {} failed: {:#}", hash, e),
            }
            if Instant::now() + self.poll_interval > deadline {
                anyhow::bail!(
                    "Request timed out waiting for receipt of {} after {}s",
                    hash,
                    self.timeout.as_secs()
                );
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
