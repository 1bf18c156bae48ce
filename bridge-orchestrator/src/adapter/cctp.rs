//! CCTP v1 Bridge Adapter
//!
//! Moves USDC with Circle's Cross-Chain Transfer Protocol:
//! 1. `approve(tokenMessenger, amount)` on the source USDC, skipped when the allowance suffices
//! 2. `depositForBurn(amount, destinationDomain, mintRecipient, usdc)` on the source TokenMessenger
//! 3. poll the attestation service for the burn message
//! 4. `receiveMessage(message, attestation)` on the destination MessageTransmitter
//!
//! Every step waits for its receipt before the next one starts, and the first failing
//! step ends the run.

use async_trait::async_trait;
use chain_clients_evm::{event_topic, keccak256, EvmClient, EvmReceipt};
use ethereum_types::U256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::attestation::AttestationClient;
use super::receipts::ReceiptWatcher;
use super::{AdapterResult, AdapterState, AdapterStep, BridgeAdapter, BridgeParams};
use crate::abi::{self, EVENT_MESSAGE_SENT};
use crate::chains::ChainDescriptor;
use crate::config::ServiceConfig;
use crate::errors::{user_facing_message, AdapterError};
use crate::transport::{build_tx, result_hash, RpcRequest, Transport};

pub const STEP_APPROVE: &str = "approve";
pub const STEP_BURN: &str = "burn";
pub const STEP_FETCH_ATTESTATION: &str = "fetchAttestation";
pub const STEP_MINT: &str = "mint";

/// Timing and endpoint settings of the adapter.
#[derive(Debug, Clone)]
pub struct CctpSettings {
    pub attestation_api_url: String,
    pub attestation_timeout: Duration,
    pub attestation_poll_interval: Duration,
    pub receipt_timeout: Duration,
    pub receipt_poll_interval: Duration,
}

impl From<&ServiceConfig> for CctpSettings {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            attestation_api_url: config.attestation_api_url.clone(),
            attestation_timeout: Duration::from_millis(config.attestation_timeout_ms),
            attestation_poll_interval: Duration::from_millis(config.attestation_poll_interval_ms),
            receipt_timeout: Duration::from_millis(config.receipt_timeout_ms),
            receipt_poll_interval: Duration::from_millis(config.receipt_poll_interval_ms),
        }
    }
}

pub struct CctpAdapter {
    settings: CctpSettings,
    attestation: AttestationClient,
}

impl CctpAdapter {
    pub fn new(settings: CctpSettings) -> anyhow::Result<Self> {
        let attestation = AttestationClient::new(&settings.attestation_api_url)?;
        Ok(Self {
            settings,
            attestation,
        })
    }

    fn watcher(&self, chain: &ChainDescriptor) -> Result<ReceiptWatcher, AdapterError> {
        ReceiptWatcher::new(
            chain,
            self.settings.receipt_timeout,
            self.settings.receipt_poll_interval,
        )
        .map_err(|e| AdapterError::Setup(format!("{:#}", e)))
    }

    /// Sends a transaction through the run's transport and waits for its receipt.
    async fn send_and_wait(
        &self,
        transport: &Arc<dyn Transport>,
        watcher: &ReceiptWatcher,
        tx: serde_json::Value,
    ) -> Result<(String, EvmReceipt), StepFailure> {
        let result = transport
            .request(RpcRequest::send_transaction(tx))
            .await
            .map_err(|e| StepFailure::new(None, e.to_string()))?;
        let hash = result_hash(&result).map_err(|e| StepFailure::new(None, e.to_string()))?;
        let receipt = watcher
            .wait(&hash)
            .await
            .map_err(|e| StepFailure::new(Some(hash.clone()), format!("{:#}", e)))?;
        Ok((hash, receipt))
    }
}

/// A failed step: the hash if one was obtained, and why.
struct StepFailure {
    tx_hash: Option<String>,
    message: String,
}

impl StepFailure {
    fn new(tx_hash: Option<String>, message: String) -> Self {
        Self {
            tx_hash,
            message: user_facing_message(&message),
        }
    }
}

/// Extracts the CCTP message from a burn receipt.
///
/// # Returns
///
/// * `Ok((message, message_hash))` - message bytes and 0x-prefixed keccak256 of them
fn message_sent(receipt: &EvmReceipt) -> anyhow::Result<(Vec<u8>, String)> {
    let topic = event_topic(EVENT_MESSAGE_SENT);
    let log = receipt
        .logs_with_topic(&topic)
        .next()
        .ok_or_else(|| anyhow::anyhow!("No MessageSent event in burn receipt {}", receipt.transaction_hash))?;
    let data = chain_clients_common::decode_hex(&log.data)
        .map_err(|e| anyhow::anyhow!("MessageSent data is not valid hex: {}", e))?;
    let message = abi::decode_single_bytes(&data)?;
    let message_hash = format!("0x{}", hex::encode(keccak256(&message)));
    Ok((message, message_hash))
}

/// Reads the full uint256 allowance (unlimited approvals exceed u128).
async fn read_allowance(
    reader: &EvmClient,
    token: &str,
    owner: &str,
    spender: &str,
) -> anyhow::Result<U256> {
    let data = abi::erc20_allowance_calldata(owner, spender)?;
    let output = reader.call(token, &data).await?;
    abi::decode_u256(&output)
}

fn failed(steps: Vec<AdapterStep>, burn_hash: Option<String>) -> AdapterResult {
    AdapterResult::Steps {
        state: AdapterState::Error,
        steps,
        source_transaction_hash: burn_hash,
    }
}

#[async_trait]
impl BridgeAdapter for CctpAdapter {
    async fn execute(
        &self,
        params: BridgeParams,
        transport: Arc<dyn Transport>,
    ) -> Result<AdapterResult, AdapterError> {
        let source = &params.source;
        let destination = &params.destination;
        let source_reader =
            EvmClient::new(&source.rpc_url).map_err(|e| AdapterError::Setup(format!("{:#}", e)))?;
        let source_watcher = self.watcher(source)?;
        let destination_watcher = self.watcher(destination)?;

        let decimals = match source.usdc_decimals {
            Some(decimals) => decimals,
            None => source_reader
                .erc20_decimals(&source.usdc_addr)
                .await
                .map_err(|e| AdapterError::Setup(format!("Failed to read token decimals: {:#}", e)))?,
        };
        let units = abi::parse_units(&params.amount, decimals)
            .map_err(|e| AdapterError::InvalidAmount(e.to_string()))?;
        if units.is_zero() {
            return Err(AdapterError::InvalidAmount(params.amount.clone()));
        }

        info!(
            "Bridging {} USDC ({} base units) from {} to {} for {}",
            params.amount, units, source.display_name, destination.display_name, params.recipient
        );

        let mut steps = Vec::new();
        transport.request(RpcRequest::switch_chain(source.chain_id)).await?;

        // Approve
        let allowance = match read_allowance(
            &source_reader,
            &source.usdc_addr,
            &params.owner,
            &source.token_messenger_addr,
        )
        .await
        {
            Ok(allowance) => allowance,
            Err(e) => {
                warn!("Allowance read failed, approving anyway: {:#}", e);
                U256::zero()
            }
        };
        if allowance >= units {
            info!("Allowance {} already covers {}, skipping approval", allowance, units);
            steps.push(AdapterStep::success(STEP_APPROVE, None));
        } else {
            let data = abi::erc20_approve_calldata(&source.token_messenger_addr, units)
                .map_err(|e| AdapterError::Setup(e.to_string()))?;
            let tx = build_tx(&params.owner, &source.usdc_addr, &data, source.chain_id);
            match self.send_and_wait(&transport, &source_watcher, tx).await {
                Ok((hash, _)) => steps.push(AdapterStep::success(STEP_APPROVE, Some(hash))),
                Err(f) => {
                    steps.push(AdapterStep::error(STEP_APPROVE, f.tx_hash, f.message));
                    return Ok(failed(steps, None));
                }
            }
        }

        // Burn
        let data = abi::deposit_for_burn_calldata(
            units,
            destination.cctp_domain,
            &params.recipient,
            &source.usdc_addr,
        )
        .map_err(|e| AdapterError::Setup(e.to_string()))?;
        let tx = build_tx(&params.owner, &source.token_messenger_addr, &data, source.chain_id);
        let (burn_hash, burn_receipt) = match self.send_and_wait(&transport, &source_watcher, tx).await {
            Ok(sent) => sent,
            Err(f) => {
                steps.push(AdapterStep::error(STEP_BURN, f.tx_hash, f.message));
                return Ok(failed(steps, None));
            }
        };
        steps.push(AdapterStep::success(STEP_BURN, Some(burn_hash.clone())));
        let burn_hash = Some(burn_hash);

        // Attestation
        let (message, message_hash) = match message_sent(&burn_receipt) {
            Ok(found) => found,
            Err(e) => {
                steps.push(AdapterStep::error(STEP_FETCH_ATTESTATION, None, format!("{:#}", e)));
                return Ok(failed(steps, burn_hash));
            }
        };
        let attestation = match self
            .attestation
            .wait_for_attestation(
                &message_hash,
                self.settings.attestation_timeout,
                self.settings.attestation_poll_interval,
            )
            .await
        {
            Ok(attestation) => attestation,
            Err(e) => {
                steps.push(AdapterStep::error(STEP_FETCH_ATTESTATION, None, format!("{:#}", e)));
                return Ok(failed(steps, burn_hash));
            }
        };
        steps.push(AdapterStep::success(STEP_FETCH_ATTESTATION, None));

        // Mint
        if let Err(e) = transport
            .request(RpcRequest::switch_chain(destination.chain_id))
            .await
        {
            steps.push(AdapterStep::error(STEP_MINT, None, e.to_string()));
            return Ok(failed(steps, burn_hash));
        }
        let data = abi::receive_message_calldata(&message, &attestation);
        let tx = build_tx(
            &params.owner,
            &destination.message_transmitter_addr,
            &data,
            destination.chain_id,
        );
        match self.send_and_wait(&transport, &destination_watcher, tx).await {
            Ok((hash, _)) => steps.push(AdapterStep::success(STEP_MINT, Some(hash))),
            Err(f) => {
                steps.push(AdapterStep::error(STEP_MINT, f.tx_hash, f.message));
                return Ok(failed(steps, burn_hash));
            }
        }

        Ok(AdapterResult::Steps {
            state: AdapterState::Success,
            steps,
            source_transaction_hash: burn_hash,
        })
    }
}
