//! Shared test helpers for bridge orchestrator tests
//!
//! This module provides constants, builders and in-memory collaborators (transport,
//! adapters, observer) used across the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_orchestrator::abi;
use bridge_orchestrator::adapter::{AdapterResult, AdapterState, AdapterStep, BridgeAdapter, BridgeParams};
use bridge_orchestrator::chains::{ChainDescriptor, ChainRole, StaticChainRegistry};
use bridge_orchestrator::config::{
    BridgeConfig, ChainConfig, ClassifierConfig, ServiceConfig, SponsorshipConfig, WalletConfig,
};
use bridge_orchestrator::errors::{AdapterError, ProviderError};
use bridge_orchestrator::progress::{ProgressEvent, ProgressObserver};
use bridge_orchestrator::transport::{build_tx, result_hash, RpcRequest, Transport, ETH_SEND_TRANSACTION};
use ethereum_types::U256;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

// ============================================================================
// CONSTANTS
// ============================================================================

// -------------------------------- CHAINS --------------------------------

/// Hub chain (never sponsored)
pub const HUB_CHAIN_ID: u64 = 11155111;

/// Ordinary chain with bundler and paymaster
pub const CAPABLE_CHAIN_ID: u64 = 84532;

/// Ordinary chain without sponsorship infrastructure
pub const PLAIN_CHAIN_ID: u64 = 421614;

/// Chain ID no registry knows
pub const UNKNOWN_CHAIN_ID: u64 = 999_999;

/// RPC URL that refuses connections
pub const DUMMY_RPC_URL: &str = "http://127.0.0.1:1";

// -------------------------------- USERS ---------------------------------

/// Dummy user address (EVM format, 40 hex characters)
pub const DUMMY_USER_ADDR: &str = "0x0000000000000000000000000000000000000006";

/// Dummy recipient address (EVM format, 40 hex characters)
pub const DUMMY_RECIPIENT_ADDR: &str = "0x0000000000000000000000000000000000000009";

/// Private key 1; its address is 0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf
pub const DUMMY_PRIVATE_KEY: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000001";

/// Address of DUMMY_PRIVATE_KEY
pub const DUMMY_PRIVATE_KEY_ADDR: &str = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";

// ------------------------- TOKENS AND CONTRACTS -------------------------

/// Dummy USDC address (EVM format, 40 hex characters)
pub const DUMMY_USDC_ADDR: &str = "0x000000000000000000000000000000000000000a";

/// Dummy CCTP TokenMessenger address
pub const DUMMY_TOKEN_MESSENGER_ADDR: &str = "0x000000000000000000000000000000000000000b";

/// Dummy CCTP MessageTransmitter address
pub const DUMMY_MESSAGE_TRANSMITTER_ADDR: &str = "0x000000000000000000000000000000000000000c";

/// Dummy delegation contract address
pub const DUMMY_DELEGATION_ADDR: &str = "0x000000000000000000000000000000000000000d";

/// Dummy contract no classifier rule knows
pub const DUMMY_OTHER_CONTRACT_ADDR: &str = "0x000000000000000000000000000000000000000e";

// ------------------------------- HASHES ---------------------------------

/// Hash returned by the bundler for sponsored operations
pub const DUMMY_USER_OP_HASH: &str =
    "0x00000000000000000000000000000000000000000000000000000000000000ff";

/// Deterministic transaction hash for the n-th send of a MockTransport
pub fn tx_hash(n: usize) -> String {
    format!("0x{:064x}", n + 1)
}

// ============================================================================
// CHAINS AND CONFIG
// ============================================================================

/// Create a chain descriptor with dummy contract addresses
pub fn create_chain(chain_id: u64, role: ChainRole, capable: bool) -> ChainDescriptor {
    ChainDescriptor {
        chain_id,
        display_name: format!("Chain {}", chain_id),
        role,
        sponsorship_capable: capable,
        rpc_url: DUMMY_RPC_URL.to_string(),
        explorer_url: String::new(),
        bundler_url: if capable {
            Some(DUMMY_RPC_URL.to_string())
        } else {
            None
        },
        usdc_addr: DUMMY_USDC_ADDR.to_string(),
        usdc_decimals: Some(6),
        token_messenger_addr: DUMMY_TOKEN_MESSENGER_ADDR.to_string(),
        message_transmitter_addr: DUMMY_MESSAGE_TRANSMITTER_ADDR.to_string(),
        cctp_domain: (chain_id % 10) as u32,
    }
}

pub fn create_hub_chain() -> ChainDescriptor {
    create_chain(HUB_CHAIN_ID, ChainRole::Hub, false)
}

pub fn create_capable_chain() -> ChainDescriptor {
    create_chain(CAPABLE_CHAIN_ID, ChainRole::Ordinary, true)
}

pub fn create_plain_chain() -> ChainDescriptor {
    create_chain(PLAIN_CHAIN_ID, ChainRole::Ordinary, false)
}

/// Point a chain's RPC and bundler at a mock server
pub fn with_endpoints(mut chain: ChainDescriptor, url: &str) -> ChainDescriptor {
    chain.rpc_url = url.to_string();
    if chain.sponsorship_capable {
        chain.bundler_url = Some(url.to_string());
    }
    chain
}

/// Create the default registry: hub, capable and plain chains
pub fn create_default_registry() -> StaticChainRegistry {
    StaticChainRegistry::new([create_hub_chain(), create_capable_chain(), create_plain_chain()])
}

fn chain_config(chain: &ChainDescriptor) -> ChainConfig {
    ChainConfig {
        name: chain.display_name.clone(),
        chain_id: chain.chain_id,
        role: chain.role,
        sponsorship_capable: chain.sponsorship_capable,
        rpc_url: chain.rpc_url.clone(),
        explorer_url: chain.explorer_url.clone(),
        bundler_url: chain.bundler_url.clone(),
        usdc_addr: chain.usdc_addr.clone(),
        usdc_decimals: chain.usdc_decimals,
        token_messenger_addr: chain.token_messenger_addr.clone(),
        message_transmitter_addr: chain.message_transmitter_addr.clone(),
        cctp_domain: chain.cctp_domain,
    }
}

/// Create a valid config with the default chains and sponsorship switched on
pub fn create_default_config() -> BridgeConfig {
    BridgeConfig {
        service: ServiceConfig {
            sponsorship_enabled: true,
            attestation_api_url: "http://127.0.0.1:1".to_string(),
            attestation_timeout_ms: 1000,
            attestation_poll_interval_ms: 10,
            receipt_timeout_ms: 1000,
            receipt_poll_interval_ms: 10,
        },
        wallet: WalletConfig {
            address: DUMMY_USER_ADDR.to_string(),
            private_key_env: "BRIDGE_TEST_PRIVATE_KEY".to_string(),
        },
        sponsorship: SponsorshipConfig {
            delegation_contract_addr: Some(DUMMY_DELEGATION_ADDR.to_string()),
            paymaster_policy_id: None,
        },
        classifier: ClassifierConfig::default(),
        chain: [create_hub_chain(), create_capable_chain(), create_plain_chain()]
            .iter()
            .map(chain_config)
            .collect(),
    }
}

pub fn create_default_sponsorship() -> SponsorshipConfig {
    SponsorshipConfig {
        delegation_contract_addr: Some(DUMMY_DELEGATION_ADDR.to_string()),
        paymaster_policy_id: None,
    }
}

// ============================================================================
// TRANSPORT
// ============================================================================

type Responder = Box<dyn Fn(&RpcRequest, usize) -> Result<Value, ProviderError> + Send + Sync>;

/// In-memory signing transport recording every request.
///
/// The responder gets the request and the number of `eth_sendTransaction` calls
/// seen before it.
pub struct MockTransport {
    requests: Mutex<Vec<RpcRequest>>,
    sends: AtomicUsize,
    responder: Responder,
}

impl MockTransport {
    pub fn new(
        responder: impl Fn(&RpcRequest, usize) -> Result<Value, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            sends: AtomicUsize::new(0),
            responder: Box::new(responder),
        }
    }

    /// Every send returns `tx_hash(n)`, everything else null
    pub fn succeeding() -> Self {
        Self::new(|request, n| {
            if request.method == ETH_SEND_TRANSACTION {
                Ok(Value::String(tx_hash(n)))
            } else {
                Ok(Value::Null)
            }
        })
    }

    pub fn requests(&self) -> Vec<RpcRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn sent_transactions(&self) -> Vec<RpcRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == ETH_SEND_TRANSACTION)
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, request: RpcRequest) -> Result<Value, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());
        let n = if request.method == ETH_SEND_TRANSACTION {
            self.sends.fetch_add(1, Ordering::SeqCst)
        } else {
            self.sends.load(Ordering::SeqCst)
        };
        (self.responder)(&request, n)
    }
}

// ============================================================================
// OBSERVER
// ============================================================================

/// Observer collecting every event
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_event(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ============================================================================
// ADAPTERS
// ============================================================================

/// Adapter returning a fixed result without touching the transport
pub struct FixedAdapter {
    result: Mutex<Option<Result<AdapterResult, AdapterError>>>,
    pub params: Mutex<Vec<BridgeParams>>,
}

impl FixedAdapter {
    pub fn new(result: Result<AdapterResult, AdapterError>) -> Self {
        Self {
            result: Mutex::new(Some(result)),
            params: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BridgeAdapter for FixedAdapter {
    async fn execute(
        &self,
        params: BridgeParams,
        _transport: Arc<dyn Transport>,
    ) -> Result<AdapterResult, AdapterError> {
        self.params.lock().unwrap().push(params);
        self.result
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(AdapterError::Setup("FixedAdapter called twice".to_string())))
    }
}

/// Adapter that sends approve, burn and mint through the run's transport without
/// waiting for receipts or attestations.
///
/// With `fail_after_burn` set it returns an adapter error right after the burn.
#[derive(Default)]
pub struct DrivingAdapter {
    pub fail_after_burn: bool,
    pub params: Mutex<Vec<BridgeParams>>,
}

async fn drive_send(transport: &Arc<dyn Transport>, tx: Value) -> Result<String, String> {
    let result = transport
        .request(RpcRequest::send_transaction(tx))
        .await
        .map_err(|e| e.to_string())?;
    result_hash(&result).map_err(|e| e.to_string())
}

fn driven_failure(steps: Vec<AdapterStep>, burn_hash: Option<String>) -> AdapterResult {
    AdapterResult::Steps {
        state: AdapterState::Error,
        steps,
        source_transaction_hash: burn_hash,
    }
}

#[async_trait]
impl BridgeAdapter for DrivingAdapter {
    async fn execute(
        &self,
        params: BridgeParams,
        transport: Arc<dyn Transport>,
    ) -> Result<AdapterResult, AdapterError> {
        self.params.lock().unwrap().push(params.clone());
        let source = &params.source;
        let destination = &params.destination;
        let units = U256::from(1_000_000u64);
        let mut steps = Vec::new();

        transport.request(RpcRequest::switch_chain(source.chain_id)).await?;

        let data = abi::erc20_approve_calldata(&source.token_messenger_addr, units).unwrap();
        let tx = build_tx(&params.owner, &source.usdc_addr, &data, source.chain_id);
        match drive_send(&transport, tx).await {
            Ok(hash) => steps.push(AdapterStep::success("approve", Some(hash))),
            Err(e) => {
                steps.push(AdapterStep::error("approve", None, e));
                return Ok(driven_failure(steps, None));
            }
        }

        let data = abi::deposit_for_burn_calldata(
            units,
            destination.cctp_domain,
            &params.recipient,
            &source.usdc_addr,
        )
        .unwrap();
        let tx = build_tx(&params.owner, &source.token_messenger_addr, &data, source.chain_id);
        let burn_hash = match drive_send(&transport, tx).await {
            Ok(hash) => hash,
            Err(e) => {
                steps.push(AdapterStep::error("depositForBurn", None, e));
                return Ok(driven_failure(steps, None));
            }
        };
        steps.push(AdapterStep::success("depositForBurn", Some(burn_hash.clone())));

        if self.fail_after_burn {
            return Err(AdapterError::Setup("attestation service unreachable".to_string()));
        }
        steps.push(AdapterStep::success("fetchAttestation", None));

        transport
            .request(RpcRequest::switch_chain(destination.chain_id))
            .await?;
        let data = abi::receive_message_calldata(&[0x01; 120], &[0x02; 65]);
        let tx = build_tx(
            &params.owner,
            &destination.message_transmitter_addr,
            &data,
            destination.chain_id,
        );
        match drive_send(&transport, tx).await {
            Ok(hash) => steps.push(AdapterStep::success("receiveMessage", Some(hash))),
            Err(e) => {
                steps.push(AdapterStep::error("receiveMessage", None, e));
                return Ok(driven_failure(steps, Some(burn_hash)));
            }
        }

        Ok(AdapterResult::Steps {
            state: AdapterState::Success,
            steps,
            source_transaction_hash: Some(burn_hash),
        })
    }
}

/// Adapter that parks until released, for in-flight tests
#[derive(Default)]
pub struct BlockingAdapter {
    pub started: Notify,
    pub release: Notify,
}

#[async_trait]
impl BridgeAdapter for BlockingAdapter {
    async fn execute(
        &self,
        _params: BridgeParams,
        _transport: Arc<dyn Transport>,
    ) -> Result<AdapterResult, AdapterError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(AdapterResult::Token(tx_hash(41)))
    }
}
