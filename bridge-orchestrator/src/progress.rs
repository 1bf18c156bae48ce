//! Progress Reporting
//!
//! Step-status transitions for a single `transfer` call. The caller hands an observer
//! to the orchestrator; the run's [`ProgressReporter`] owns it together with the step
//! board and is dropped when the run ends, so events never leak across runs.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Fixed step slots of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepName {
    Approval,
    Burn,
    Mint,
    Transfer,
}

impl StepName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::Approval => "approval",
            StepName::Burn => "burn",
            StepName::Mint => "mint",
            StepName::Transfer => "transfer",
        }
    }
}

impl std::fmt::Display for StepName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    /// Waiting on the user (wallet confirmation) or an external service (attestation)
    Waiting,
    /// Submitted and being processed (sponsored submissions report this)
    Processing,
    Completed,
    Error,
}

/// One slot of the step board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: StepName,
    pub status: StepStatus,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

/// A step-status transition delivered to the observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub step: StepName,
    pub status: StepStatus,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

/// Receives step-status transitions for one run.
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_event(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Forwards events into an unbounded channel; a closed receiver is ignored.
pub struct ChannelObserver(pub UnboundedSender<ProgressEvent>);

impl ProgressObserver for ChannelObserver {
    fn on_event(&self, event: &ProgressEvent) {
        if self.0.send(event.clone()).is_err() {
            debug!("Progress receiver dropped, event for {} discarded", event.step);
        }
    }
}

/// Default description for a step in a given status.
pub fn describe(step: StepName, status: StepStatus) -> String {
    let text = match (step, status) {
        (StepName::Approval, StepStatus::Pending) => "Approve token spending",
        (StepName::Approval, StepStatus::Waiting) => "Confirm the token approval in your wallet",
        (StepName::Approval, StepStatus::Processing) => "Submitting the approval",
        (StepName::Approval, StepStatus::Completed) => "Token spending approved",
        (StepName::Approval, StepStatus::Error) => "Approval failed",
        (StepName::Burn, StepStatus::Pending) => "Burn tokens on the source network",
        (StepName::Burn, StepStatus::Waiting) => "Confirm the burn in your wallet",
        (StepName::Burn, StepStatus::Processing) => "Submitting the burn",
        (StepName::Burn, StepStatus::Completed) => "Tokens burned on the source network",
        (StepName::Burn, StepStatus::Error) => "Burn failed",
        (StepName::Mint, StepStatus::Pending) => "Mint tokens on the destination network",
        (StepName::Mint, StepStatus::Waiting) => "Waiting for attestation",
        (StepName::Mint, StepStatus::Processing) => "Submitting the mint",
        (StepName::Mint, StepStatus::Completed) => "Tokens minted on the destination network",
        (StepName::Mint, StepStatus::Error) => "Mint failed",
        (StepName::Transfer, StepStatus::Pending) => "Send tokens",
        (StepName::Transfer, StepStatus::Waiting) => "Confirm the transfer in your wallet",
        (StepName::Transfer, StepStatus::Processing) => "Submitting the transfer",
        (StepName::Transfer, StepStatus::Completed) => "Tokens sent",
        (StepName::Transfer, StepStatus::Error) => "Transfer failed",
    };
    text.to_string()
}

/// Description for a step whose transaction was submitted but is not confirmed yet.
pub fn describe_submitted(step: StepName) -> String {
    let text = match step {
        StepName::Approval => "Approval submitted, waiting for confirmation",
        StepName::Burn => "Burn submitted, waiting for confirmation",
        StepName::Mint => "Mint submitted, waiting for confirmation",
        StepName::Transfer => "Transfer submitted",
    };
    text.to_string()
}

/// Step board and observer for one run.
pub struct ProgressReporter {
    observer: Option<Arc<dyn ProgressObserver>>,
    board: Mutex<Vec<StepRecord>>,
}

impl ProgressReporter {
    /// Creates a reporter whose board holds `steps` in order, all Pending.
    pub fn new(observer: Option<Arc<dyn ProgressObserver>>, steps: &[StepName]) -> Self {
        let board = steps
            .iter()
            .map(|step| StepRecord {
                name: *step,
                status: StepStatus::Pending,
                description: describe(*step, StepStatus::Pending),
                tx_hash: None,
            })
            .collect();
        Self {
            observer,
            board: Mutex::new(board),
        }
    }

    /// Updates a step and notifies the observer.
    ///
    /// A step that is not on the board is logged and otherwise ignored. A hash, once
    /// recorded, is kept when a later transition carries none.
    pub fn update(
        &self,
        step: StepName,
        status: StepStatus,
        description: impl Into<String>,
        tx_hash: Option<String>,
    ) {
        let description = description.into();
        let event = {
            let mut board = self.board.lock().unwrap_or_else(|e| e.into_inner());
            let Some(record) = board.iter_mut().find(|r| r.name == step) else {
                warn!("Progress update for step {} which is not part of this run", step);
                return;
            };
            record.status = status;
            record.description = description.clone();
            if tx_hash.is_some() {
                record.tx_hash = tx_hash.clone();
            }
            ProgressEvent {
                step,
                status,
                description,
                tx_hash: record.tx_hash.clone(),
            }
        };

        match &event.tx_hash {
            Some(hash) => info!("[{}] {:?}: {} ({})", event.step, event.status, event.description, hash),
            None => info!("[{}] {:?}: {}", event.step, event.status, event.description),
        }

        if let Some(observer) = &self.observer {
            observer.on_event(&event);
        }
    }

    /// Updates a step using the default description for the status.
    pub fn set(&self, step: StepName, status: StepStatus, tx_hash: Option<String>) {
        self.update(step, status, describe(step, status), tx_hash);
    }

    /// Records a submitted hash; the step stays Processing until it is confirmed.
    pub fn submitted(&self, step: StepName, tx_hash: String) {
        self.update(step, StepStatus::Processing, describe_submitted(step), Some(tx_hash));
    }

    pub fn record(&self, step: StepName) -> Option<StepRecord> {
        self.board
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|r| r.name == step)
            .cloned()
    }

    /// Current board, in step order.
    pub fn snapshot(&self) -> Vec<StepRecord> {
        self.board.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
