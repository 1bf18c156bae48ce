//! Provider Interception Chain
//!
//! Wraps the base signing transport for one run. Every `eth_sendTransaction` is
//! classified exactly once at the entry of the chain; the layers below only ever
//! see a classified [`TransactionIntent`]. Unknown transactions and non-transaction
//! requests reach the base transport unmodified.
//!
//! Layering:
//! - sponsorship enabled for the run: `SponsorshipLayer(inner = AnnotationLayer)` outermost,
//!   unsponsored steps go straight to the base transport
//! - sponsorship disabled: `AnnotationLayer` outermost

pub mod annotation;
pub mod session;
pub mod sponsorship;

pub use annotation::AnnotationLayer;
pub use session::{SessionCache, SmartAccountSession};
pub use sponsorship::{SponsoredOperation, SponsorshipLayer};

use async_trait::async_trait;
use chain_clients_common::decode_hex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::chains::ChainDescriptor;
use crate::classifier::{StepKind, TransactionClassifier, TransactionIntent};
use crate::config::SponsorshipConfig;
use crate::crypto::AuthorizationSigner;
use crate::errors::ProviderError;
use crate::progress::{ProgressReporter, StepName, StepStatus};
use crate::transport::{RpcRequest, TransactionFields, Transport, ETH_SEND_TRANSACTION};

/// Per-run state shared by the layers.
pub struct RunContext {
    pub source: ChainDescriptor,
    pub destination: ChainDescriptor,
    /// Account that sends every step and owns the delegated account when sponsored
    pub owner: String,
    /// Whether sponsorship may be applied at all in this run
    pub sponsorship_enabled: bool,
    pub reporter: Arc<ProgressReporter>,
    aborted: AtomicBool,
    active_chain: AtomicU64,
}

impl RunContext {
    pub fn new(
        source: ChainDescriptor,
        destination: ChainDescriptor,
        owner: impl Into<String>,
        sponsorship_enabled: bool,
        reporter: Arc<ProgressReporter>,
    ) -> Self {
        let active_chain = AtomicU64::new(source.chain_id);
        Self {
            source,
            destination,
            owner: owner.into(),
            sponsorship_enabled,
            reporter,
            aborted: AtomicBool::new(false),
            active_chain,
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    /// Chain of the most recent switch request (the source until one is seen).
    pub fn active_chain(&self) -> u64 {
        self.active_chain.load(Ordering::SeqCst)
    }

    pub fn set_active_chain(&self, chain_id: u64) {
        self.active_chain.store(chain_id, Ordering::SeqCst);
    }
}

/// A layer that sends an already-classified intent and returns its hash.
#[async_trait]
pub trait IntentSender: Send + Sync {
    /// Called by an outer layer before it takes over an intent.
    fn announce(&self, _intent: &TransactionIntent) {}

    async fn send(&self, intent: TransactionIntent) -> Result<String, ProviderError>;
}

/// The run's provider: classification at the entry, layers behind it.
pub struct ProviderChain {
    base: Arc<dyn Transport>,
    outer: Arc<dyn IntentSender>,
    classifier: Arc<TransactionClassifier>,
    run: Arc<RunContext>,
}

impl ProviderChain {
    /// Builds the chain for one run.
    ///
    /// `signer` is only consulted for sponsored steps; a run that needs one without
    /// a signer fails that step with a sponsorship error.
    pub fn new(
        base: Arc<dyn Transport>,
        classifier: Arc<TransactionClassifier>,
        run: Arc<RunContext>,
        sponsorship: SponsorshipConfig,
        signer: Option<Arc<dyn AuthorizationSigner>>,
    ) -> Self {
        let annotation: Arc<dyn IntentSender> =
            Arc::new(AnnotationLayer::new(base.clone(), run.clone()));
        let outer: Arc<dyn IntentSender> = if run.sponsorship_enabled {
            Arc::new(SponsorshipLayer::new(
                annotation,
                base.clone(),
                run.clone(),
                sponsorship,
                signer,
            ))
        } else {
            annotation
        };
        Self {
            base,
            outer,
            classifier,
            run,
        }
    }

    pub fn run(&self) -> &Arc<RunContext> {
        &self.run
    }

    async fn send_transaction(&self, request: RpcRequest) -> Result<Value, ProviderError> {
        if self.run.is_aborted() {
            return Err(ProviderError::RunAborted);
        }

        let tx = request
            .params
            .first()
            .cloned()
            .ok_or_else(|| ProviderError::InvalidRequest("eth_sendTransaction without a transaction".to_string()))?;
        let Ok(fields) = TransactionFields::from_tx(&tx) else {
            debug!("Transaction without a target address, passing through");
            return self.base.request(request).await;
        };
        let data = decode_hex(&fields.data).unwrap_or_default();
        let kind = self.classifier.classify(&data);
        let Some(step) = kind.step_name() else {
            debug!("Unclassified transaction to {}, passing through", fields.to);
            return self.base.request(request).await;
        };

        let intent = TransactionIntent {
            chain_id: fields.chain_id.unwrap_or_else(|| self.run.active_chain()),
            to: fields.to,
            data,
            value: fields.value,
            kind,
            tx,
        };

        match self.outer.send(intent).await {
            Ok(hash) => {
                if kind == StepKind::Burn && self.run.reporter.record(StepName::Mint).is_some() {
                    self.run.reporter.set(StepName::Mint, StepStatus::Waiting, None);
                }
                Ok(Value::String(hash))
            }
            Err(e) => {
                if e.aborts_run() && !self.run.is_aborted() {
                    error!("Aborting run after {} failure: {}", step, e);
                    self.run.abort();
                } else {
                    warn!("{} failed: {}", step, e);
                }
                self.run
                    .reporter
                    .update(step, StepStatus::Error, e.to_string(), None);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Transport for ProviderChain {
    async fn request(&self, request: RpcRequest) -> Result<Value, ProviderError> {
        if request.method == ETH_SEND_TRANSACTION {
            return self.send_transaction(request).await;
        }
        if request.is_switch_chain() {
            if let Some(chain_id) = request.target_chain_id() {
                self.run.set_active_chain(chain_id);
            }
        }
        self.base.request(request).await
    }
}
