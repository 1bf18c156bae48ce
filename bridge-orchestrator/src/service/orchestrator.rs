//! Bridge Orchestrator
//!
//! Drives one transfer at a time:
//! `Idle -> Validating -> {SameChainTransfer | CrossChainBridge} -> {Success | Partial | Error}`.
//!
//! Each run gets its own progress reporter, provider chain and session cache; all of
//! it is dropped when the outcome is returned. A completed burn is irreversible, so a
//! run whose mint fails ends Partial rather than Error.

use chain_clients_common::{addresses_equal, is_valid_evm_address};
use chain_clients_evm::EvmClient;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::abi;
use crate::adapter::{
    AdapterResult, AdapterState, AdapterStep, BridgeAdapter, BridgeParams, CctpAdapter, CctpSettings,
    ReceiptStatus, ReceiptWatcher,
};
use crate::chains::{ChainDescriptor, ChainRegistry, StaticChainRegistry};
use crate::classifier::TransactionClassifier;
use crate::config::{BridgeConfig, SponsorshipConfig};
use crate::crypto::AuthorizationSigner;
use crate::errors::{user_facing_message, AdapterError, TransferError, ValidationError};
use crate::progress::{ProgressObserver, ProgressReporter, StepName, StepRecord, StepStatus};
use crate::provider::{ProviderChain, RunContext};
use crate::transport::{build_tx, result_hash, RpcRequest, Transport};

// ============================================================================
// REQUEST / OUTCOME
// ============================================================================

/// One user-initiated transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Decimal amount in token units (e.g. "12.5")
    pub amount: String,
    pub source_chain: u64,
    pub destination_chain: u64,
    pub user_address: String,
    #[serde(default)]
    pub recipient_address: Option<String>,
    #[serde(default)]
    pub sponsorship_requested: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeState {
    Success,
    /// Burn succeeded, mint did not: funds are in transit until the mint is retried
    Partial,
    Error,
}

/// Final result of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeOutcome {
    pub state: OutcomeState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_tx_hash: Option<String>,
    pub steps: Vec<StepRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A request that passed validation.
#[derive(Debug, Clone)]
struct ValidatedTransfer {
    source: ChainDescriptor,
    destination: ChainDescriptor,
    recipient: String,
}

/// Releases the in-flight flag when the run ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Maps an adapter step name onto the fixed step slots.
pub fn map_adapter_step(name: &str) -> Option<StepName> {
    match name {
        "approve" | "approval" => Some(StepName::Approval),
        "burn" | "depositForBurn" => Some(StepName::Burn),
        "mint" | "receiveMessage" => Some(StepName::Mint),
        _ => None,
    }
}

const STEP_FETCH_ATTESTATION: &str = "fetchAttestation";

// ============================================================================
// ORCHESTRATOR
// ============================================================================

pub struct BridgeOrchestrator {
    registry: Arc<dyn ChainRegistry>,
    transport: Arc<dyn Transport>,
    adapter: Arc<dyn BridgeAdapter>,
    classifier: Arc<TransactionClassifier>,
    signer: Option<Arc<dyn AuthorizationSigner>>,
    sponsorship: SponsorshipConfig,
    sponsorship_enabled: bool,
    receipt_timeout: Duration,
    receipt_poll_interval: Duration,
    in_flight: AtomicBool,
}

impl BridgeOrchestrator {
    /// Creates an orchestrator over explicit collaborators.
    pub fn new(
        config: &BridgeConfig,
        registry: Arc<dyn ChainRegistry>,
        transport: Arc<dyn Transport>,
        adapter: Arc<dyn BridgeAdapter>,
        signer: Option<Arc<dyn AuthorizationSigner>>,
    ) -> Self {
        Self {
            registry,
            transport,
            adapter,
            classifier: Arc::new(TransactionClassifier::new(&config.classifier)),
            signer,
            sponsorship: config.sponsorship.clone(),
            sponsorship_enabled: config.service.sponsorship_enabled,
            receipt_timeout: Duration::from_millis(config.service.receipt_timeout_ms),
            receipt_poll_interval: Duration::from_millis(config.service.receipt_poll_interval_ms),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Creates an orchestrator with the configured chains and the CCTP adapter.
    pub fn from_config(
        config: &BridgeConfig,
        transport: Arc<dyn Transport>,
        signer: Option<Arc<dyn AuthorizationSigner>>,
    ) -> anyhow::Result<Self> {
        let registry: Arc<dyn ChainRegistry> = Arc::new(StaticChainRegistry::from_config(config));
        let adapter: Arc<dyn BridgeAdapter> =
            Arc::new(CctpAdapter::new(CctpSettings::from(&config.service))?);
        Ok(Self::new(config, registry, transport, adapter, signer))
    }

    /// Whether a transfer is currently executing.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Executes one transfer.
    ///
    /// # Returns
    ///
    /// * `Ok(BridgeOutcome)` - The run executed (its state may still be Partial or Error)
    /// * `Err(TransferError::InFlight)` - Another transfer is running; nothing was touched
    /// * `Err(TransferError::Validation)` - The request was rejected before any chain call
    pub async fn transfer(
        &self,
        request: TransferRequest,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> Result<BridgeOutcome, TransferError> {
        let _guard = InFlightGuard::acquire(&self.in_flight).ok_or_else(|| {
            warn!("Transfer rejected: another transfer is in flight");
            TransferError::InFlight
        })?;

        let validated = self.validate(&request).map_err(|e| {
            warn!("Transfer rejected: {}", e);
            e
        })?;
        let sponsored_run = request.sponsorship_requested && self.sponsorship_enabled;
        if request.sponsorship_requested && !self.sponsorship_enabled {
            info!("Sponsorship requested but disabled by configuration");
        }

        info!(
            "Starting transfer of {} from {} to {} (recipient {}, sponsorship {})",
            request.amount,
            validated.source.display_name,
            validated.destination.display_name,
            validated.recipient,
            sponsored_run
        );

        let outcome = if validated.source.chain_id == validated.destination.chain_id {
            self.run_same_chain(&request, validated, sponsored_run, observer)
                .await
        } else {
            self.run_cross_chain(&request, validated, sponsored_run, observer)
                .await
        };

        match outcome.state {
            OutcomeState::Success => info!("Transfer succeeded: {:?}", outcome.source_tx_hash),
            OutcomeState::Partial => error!(
                "Transfer partially completed: {}",
                outcome.error.as_deref().unwrap_or_default()
            ),
            OutcomeState::Error => warn!(
                "Transfer failed: {}",
                outcome.error.as_deref().unwrap_or_default()
            ),
        }
        Ok(outcome)
    }

    fn validate(&self, request: &TransferRequest) -> Result<ValidatedTransfer, ValidationError> {
        if !abi::is_positive_decimal(&request.amount) {
            return Err(ValidationError::InvalidAmount(request.amount.clone()));
        }
        if !is_valid_evm_address(&request.user_address) {
            return Err(ValidationError::InvalidUserAddress(request.user_address.clone()));
        }
        let source = self
            .registry
            .describe(request.source_chain)
            .ok_or(ValidationError::UnknownChain(request.source_chain))?;
        let destination = self
            .registry
            .describe(request.destination_chain)
            .ok_or(ValidationError::UnknownChain(request.destination_chain))?;

        let recipient = request
            .recipient_address
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty());
        if let Some(recipient) = recipient {
            if !is_valid_evm_address(recipient) {
                return Err(ValidationError::InvalidRecipient(recipient.to_string()));
            }
        }

        let recipient = if source.chain_id == destination.chain_id {
            let recipient = recipient.ok_or(ValidationError::RecipientRequired)?;
            if addresses_equal(recipient, &request.user_address) {
                return Err(ValidationError::SelfTransfer);
            }
            recipient.to_string()
        } else {
            recipient.unwrap_or(&request.user_address).to_string()
        };

        Ok(ValidatedTransfer {
            source,
            destination,
            recipient,
        })
    }

    fn provider_for(&self, run: Arc<RunContext>) -> Arc<ProviderChain> {
        Arc::new(ProviderChain::new(
            self.transport.clone(),
            self.classifier.clone(),
            run,
            self.sponsorship.clone(),
            self.signer.clone(),
        ))
    }

    // ------------------------------------------------------------------------
    // Same-chain transfer
    // ------------------------------------------------------------------------

    async fn run_same_chain(
        &self,
        request: &TransferRequest,
        validated: ValidatedTransfer,
        sponsored_run: bool,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> BridgeOutcome {
        let reporter = Arc::new(ProgressReporter::new(observer, &[StepName::Transfer]));
        let chain = validated.source;
        let run = Arc::new(RunContext::new(
            chain.clone(),
            chain.clone(),
            request.user_address.clone(),
            sponsored_run,
            reporter.clone(),
        ));
        let provider = self.provider_for(run);

        let fail = |message: String| {
            let message = user_facing_message(&message);
            reporter.update(StepName::Transfer, StepStatus::Error, message.clone(), None);
            BridgeOutcome {
                state: OutcomeState::Error,
                source_tx_hash: None,
                steps: reporter.snapshot(),
                error: Some(message),
            }
        };

        let units = match token_units(&chain, &request.amount).await {
            Ok(units) => units,
            Err(e) => return fail(format!("{:#}", e)),
        };
        let data = match abi::erc20_transfer_calldata(&validated.recipient, units) {
            Ok(data) => data,
            Err(e) => return fail(e.to_string()),
        };
        let tx = build_tx(&request.user_address, &chain.usdc_addr, &data, chain.chain_id);

        if let Err(e) = provider.request(RpcRequest::switch_chain(chain.chain_id)).await {
            return fail(e.to_string());
        }
        // The provider chain has already put its error on the board.
        let sent = provider.request(RpcRequest::send_transaction(tx)).await;
        match sent.and_then(|result| result_hash(&result)) {
            Ok(hash) => {
                reporter.set(StepName::Transfer, StepStatus::Completed, Some(hash.clone()));
                BridgeOutcome {
                    state: OutcomeState::Success,
                    source_tx_hash: Some(hash),
                    steps: reporter.snapshot(),
                    error: None,
                }
            }
            Err(e) => fail(e.to_string()),
        }
    }

    // ------------------------------------------------------------------------
    // Cross-chain bridge
    // ------------------------------------------------------------------------

    async fn run_cross_chain(
        &self,
        request: &TransferRequest,
        validated: ValidatedTransfer,
        sponsored_run: bool,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> BridgeOutcome {
        let reporter = Arc::new(ProgressReporter::new(
            observer,
            &[StepName::Approval, StepName::Burn, StepName::Mint],
        ));
        let run = Arc::new(RunContext::new(
            validated.source.clone(),
            validated.destination.clone(),
            request.user_address.clone(),
            sponsored_run,
            reporter.clone(),
        ));
        let provider: Arc<dyn Transport> = self.provider_for(run);

        let params = BridgeParams {
            source: validated.source.clone(),
            destination: validated.destination.clone(),
            amount: request.amount.clone(),
            owner: request.user_address.clone(),
            recipient: validated.recipient,
        };

        match self.adapter.execute(params, provider).await {
            Ok(AdapterResult::Token(token)) => {
                for step in [StepName::Approval, StepName::Burn, StepName::Mint] {
                    if reporter.record(step).map(|r| r.status) != Some(StepStatus::Completed) {
                        reporter.set(step, StepStatus::Completed, None);
                    }
                }
                BridgeOutcome {
                    state: OutcomeState::Success,
                    source_tx_hash: Some(token),
                    steps: reporter.snapshot(),
                    error: None,
                }
            }
            Ok(AdapterResult::Steps {
                state,
                steps,
                source_transaction_hash,
            }) => reduce_steps(&reporter, &validated.destination, state, &steps, source_transaction_hash),
            Err(e) => {
                let burn = self.check_submitted_burn(&reporter, &validated.source).await;
                reduce_adapter_failure(&reporter, &validated.destination, burn, e)
            }
        }
    }

    /// Looks up the burn the provider chain submitted once, on the source chain.
    async fn check_submitted_burn(&self, reporter: &ProgressReporter, source: &ChainDescriptor) -> BurnCheck {
        let Some(hash) = reporter
            .record(StepName::Burn)
            .filter(|r| r.status != StepStatus::Error)
            .and_then(|r| r.tx_hash)
        else {
            return BurnCheck::NotSubmitted;
        };
        let status = match ReceiptWatcher::new(source, self.receipt_timeout, self.receipt_poll_interval) {
            Ok(watcher) => watcher.check(&hash).await,
            Err(e) => Err(e),
        };
        match status {
            Ok(ReceiptStatus::Mined(_)) => BurnCheck::Mined(hash),
            Ok(ReceiptStatus::Failed(reason)) => BurnCheck::Failed(hash, reason),
            Ok(ReceiptStatus::Pending) => BurnCheck::Unconfirmed(hash),
            Err(e) => {
                warn!("Could not check burn {} on chain {}: {:#}", hash, source.chain_id, e);
                BurnCheck::Unconfirmed(hash)
            }
        }
    }
}

/// What the source chain says about a submitted burn after the adapter failed.
enum BurnCheck {
    NotSubmitted,
    Mined(String),
    Failed(String, String),
    /// Submitted but not (yet) visible; the funds may still leave the source
    Unconfirmed(String),
}

/// Converts the request amount to base units of the chain's USDC.
async fn token_units(chain: &ChainDescriptor, amount: &str) -> anyhow::Result<ethereum_types::U256> {
    let decimals = match chain.usdc_decimals {
        Some(decimals) => decimals,
        None => EvmClient::new(&chain.rpc_url)?
            .erc20_decimals(&chain.usdc_addr)
            .await?,
    };
    abi::parse_units(amount, decimals)
}

fn partial_message(destination: &ChainDescriptor, reason: &str) -> String {
    format!(
        "The burn succeeded but the mint on {} did not complete ({}). Your funds are in transit: \
         retry the mint with the existing attestation to receive them.",
        destination.display_name, reason
    )
}

/// Reduces the adapter's per-step report into the outcome.
fn reduce_steps(
    reporter: &ProgressReporter,
    destination: &ChainDescriptor,
    adapter_state: AdapterState,
    steps: &[AdapterStep],
    source_transaction_hash: Option<String>,
) -> BridgeOutcome {
    let mut first_error: Option<String> = None;

    for step in steps {
        let message = step.error_message.as_deref().map(user_facing_message);
        match (map_adapter_step(&step.name), step.state) {
            (Some(slot), AdapterState::Success) => {
                reporter.set(slot, StepStatus::Completed, step.tx_hash.clone());
            }
            (Some(slot), AdapterState::Error) => {
                let message = message.unwrap_or_else(|| format!("{} failed", slot));
                reporter.update(slot, StepStatus::Error, message.clone(), step.tx_hash.clone());
                first_error.get_or_insert(message);
            }
            (Some(slot), AdapterState::Pending) => {
                reporter.set(slot, StepStatus::Waiting, step.tx_hash.clone());
            }
            (None, AdapterState::Error) if step.name == STEP_FETCH_ATTESTATION => {
                // The mint never started; its slot carries the reason.
                let message = message.unwrap_or_else(|| "Attestation unavailable".to_string());
                reporter.update(StepName::Mint, StepStatus::Error, message.clone(), None);
                first_error.get_or_insert(message);
            }
            (None, _) if step.name == STEP_FETCH_ATTESTATION => {
                if reporter.record(StepName::Mint).map(|r| r.status) == Some(StepStatus::Pending) {
                    reporter.set(StepName::Mint, StepStatus::Waiting, None);
                }
            }
            (None, state) => {
                if state == AdapterState::Error {
                    first_error.get_or_insert(message.unwrap_or_else(|| format!("{} failed", step.name)));
                }
            }
        }
    }

    let succeeded = |slot: StepName| {
        steps
            .iter()
            .any(|s| map_adapter_step(&s.name) == Some(slot) && s.state == AdapterState::Success)
    };
    let failed = |slot: StepName| {
        steps
            .iter()
            .any(|s| map_adapter_step(&s.name) == Some(slot) && s.state == AdapterState::Error)
    };

    let burn_hash = steps
        .iter()
        .find(|s| map_adapter_step(&s.name) == Some(StepName::Burn))
        .and_then(|s| s.tx_hash.clone())
        .or(source_transaction_hash);
    let burn_ok = succeeded(StepName::Burn);
    let mint_ok = succeeded(StepName::Mint);

    if burn_ok && mint_ok {
        if adapter_state != AdapterState::Success || failed(StepName::Approval) {
            warn!(
                "Adapter reported {:?} although burn and mint succeeded, reporting success",
                adapter_state
            );
        }
        return BridgeOutcome {
            state: OutcomeState::Success,
            source_tx_hash: burn_hash,
            steps: reporter.snapshot(),
            error: None,
        };
    }

    if burn_ok {
        let reason = first_error.unwrap_or_else(|| "mint was not executed".to_string());
        let mint_status = reporter.record(StepName::Mint).map(|r| r.status);
        if !matches!(mint_status, Some(StepStatus::Error) | Some(StepStatus::Completed)) {
            reporter.update(StepName::Mint, StepStatus::Error, reason.clone(), None);
        }
        return BridgeOutcome {
            state: OutcomeState::Partial,
            source_tx_hash: burn_hash,
            steps: reporter.snapshot(),
            error: Some(partial_message(destination, &reason)),
        };
    }

    BridgeOutcome {
        state: OutcomeState::Error,
        source_tx_hash: None,
        steps: reporter.snapshot(),
        error: Some(first_error.unwrap_or_else(|| "Bridge transfer failed".to_string())),
    }
}

/// Reduces a failed adapter run from what the provider chain recorded on the board
/// and what the source chain says about the burn.
fn reduce_adapter_failure(
    reporter: &ProgressReporter,
    destination: &ChainDescriptor,
    burn: BurnCheck,
    err: AdapterError,
) -> BridgeOutcome {
    let reason = user_facing_message(&err.to_string());

    let burn_hash = match burn {
        BurnCheck::Mined(hash) => {
            if reporter.record(StepName::Approval).map(|r| r.status) == Some(StepStatus::Processing) {
                reporter.set(StepName::Approval, StepStatus::Completed, None);
            }
            reporter.set(StepName::Burn, StepStatus::Completed, Some(hash.clone()));
            Some(hash)
        }
        BurnCheck::Unconfirmed(hash) => {
            warn!("Burn {} is not confirmed yet, treating the funds as in transit", hash);
            Some(hash)
        }
        BurnCheck::Failed(hash, failure) => {
            let failure = user_facing_message(&failure);
            reporter.update(StepName::Burn, StepStatus::Error, failure.clone(), Some(hash));
            if reporter.record(StepName::Mint).map(|r| r.status) == Some(StepStatus::Waiting) {
                reporter.set(StepName::Mint, StepStatus::Pending, None);
            }
            return BridgeOutcome {
                state: OutcomeState::Error,
                source_tx_hash: None,
                steps: reporter.snapshot(),
                error: Some(failure),
            };
        }
        BurnCheck::NotSubmitted => None,
    };

    if let Some(hash) = burn_hash {
        reporter.update(StepName::Mint, StepStatus::Error, reason.clone(), None);
        return BridgeOutcome {
            state: OutcomeState::Partial,
            source_tx_hash: Some(hash),
            steps: reporter.snapshot(),
            error: Some(partial_message(destination, &reason)),
        };
    }

    if let Some(open) = reporter
        .snapshot()
        .into_iter()
        .find(|r| r.status != StepStatus::Completed && r.status != StepStatus::Error)
    {
        reporter.update(open.name, StepStatus::Error, reason.clone(), None);
    }
    BridgeOutcome {
        state: OutcomeState::Error,
        source_tx_hash: None,
        steps: reporter.snapshot(),
        error: Some(reason),
    }
}
