//! Annotation layer: attaches human-readable context to unsponsored sends.

use async_trait::async_trait;
use chain_clients_common::is_tx_hash;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use super::{IntentSender, RunContext};
use crate::classifier::{StepKind, TransactionIntent};
use crate::errors::ProviderError;
use crate::progress::StepStatus;
use crate::transport::{result_hash, RpcRequest, Transport, ETH_SEND_TRANSACTION};

/// Wallet prompt text for a step.
pub struct UiOptions {
    pub title: &'static str,
    pub description: &'static str,
    pub button_text: &'static str,
}

impl UiOptions {
    pub fn for_kind(kind: StepKind) -> Option<Self> {
        let (title, description, button_text) = match kind {
            StepKind::Approval => ("Approve USDC", "Allow the bridge to move your USDC", "Approve"),
            StepKind::Burn => ("Bridge USDC", "Burn USDC on the source network to start the transfer", "Confirm"),
            StepKind::Mint => ("Receive USDC", "Mint your USDC on the destination network", "Confirm"),
            StepKind::Transfer => ("Send USDC", "Send USDC to the recipient", "Send"),
            StepKind::Unknown => return None,
        };
        Some(Self {
            title,
            description,
            button_text,
        })
    }

    pub fn to_json(&self) -> Value {
        json!({
            "uiOptions": {
                "title": self.title,
                "description": self.description,
                "buttonText": self.button_text,
            }
        })
    }
}

pub struct AnnotationLayer {
    base: Arc<dyn Transport>,
    run: Arc<RunContext>,
}

impl AnnotationLayer {
    pub fn new(base: Arc<dyn Transport>, run: Arc<RunContext>) -> Self {
        Self { base, run }
    }
}

#[async_trait]
impl IntentSender for AnnotationLayer {
    fn announce(&self, intent: &TransactionIntent) {
        if let Some(step) = intent.kind.step_name() {
            self.run.reporter.set(step, StepStatus::Processing, None);
        }
    }

    async fn send(&self, intent: TransactionIntent) -> Result<String, ProviderError> {
        let step = intent.kind.step_name();
        if let Some(step) = step {
            self.run.reporter.set(step, StepStatus::Waiting, None);
        }

        let mut params = vec![intent.tx.clone()];
        if let Some(ui) = UiOptions::for_kind(intent.kind) {
            params.push(ui.to_json());
        }
        let result = self
            .base
            .request(RpcRequest::new(ETH_SEND_TRANSACTION, params))
            .await?;

        let hash = match result.as_str() {
            Some(hash) if is_tx_hash(hash) => hash.to_string(),
            _ => {
                warn!("Annotated send returned {} instead of a transaction hash, re-sending", result);
                let result = self.base.request(RpcRequest::send_transaction(intent.tx)).await?;
                result_hash(&result)?
            }
        };

        if let Some(step) = step {
            self.run.reporter.submitted(step, hash.clone());
        }
        Ok(hash)
    }
}
