//! Unit tests for the CCTP bridge adapter

use bridge_orchestrator::abi::{self, u64_word};
use bridge_orchestrator::adapter::cctp::{STEP_APPROVE, STEP_BURN, STEP_FETCH_ATTESTATION, STEP_MINT};
use bridge_orchestrator::adapter::{
    AdapterResult, AdapterState, BridgeAdapter, BridgeParams, CctpAdapter, CctpSettings,
};
use bridge_orchestrator::chains::ChainDescriptor;
use bridge_orchestrator::errors::AdapterError;
use bridge_orchestrator::transport::Transport;
use chain_clients_evm::{event_topic, keccak256};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "helpers.rs"]
mod test_helpers;
use test_helpers::{
    create_capable_chain, create_hub_chain, tx_hash, MockTransport, DUMMY_MESSAGE_TRANSMITTER_ADDR,
    DUMMY_RECIPIENT_ADDR, DUMMY_TOKEN_MESSENGER_ADDR, DUMMY_USDC_ADDR, DUMMY_USER_ADDR,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// CCTP message carried by the burn's MessageSent event
fn dummy_message() -> Vec<u8> {
    (0u8..150).collect()
}

fn dummy_attestation() -> Vec<u8> {
    vec![0x42; 65]
}

fn message_hash() -> String {
    format!("0x{}", hex::encode(keccak256(&dummy_message())))
}

/// ABI encoding of `MessageSent(bytes)` data
fn message_sent_data(message: &[u8]) -> String {
    let mut data = u64_word(32).to_vec();
    data.extend(u64_word(message.len() as u64));
    data.extend_from_slice(message);
    data.resize(64 + message.len().div_ceil(32) * 32, 0);
    format!("0x{}", hex::encode(data))
}

fn rpc_result(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
}

fn receipt(hash: &str, status: &str, logs: Value) -> Value {
    json!({ "transactionHash": hash, "blockNumber": "0x10", "status": status, "logs": logs })
}

fn create_settings(attestation_url: &str) -> CctpSettings {
    CctpSettings {
        attestation_api_url: attestation_url.to_string(),
        attestation_timeout: Duration::from_secs(2),
        attestation_poll_interval: Duration::from_millis(10),
        receipt_timeout: Duration::from_secs(2),
        receipt_poll_interval: Duration::from_millis(10),
    }
}

fn create_params(source: ChainDescriptor, destination: ChainDescriptor) -> BridgeParams {
    BridgeParams {
        source,
        destination,
        amount: "2.5".to_string(),
        owner: DUMMY_USER_ADDR.to_string(),
        recipient: DUMMY_RECIPIENT_ADDR.to_string(),
    }
}

/// Mock source chain: allowance read, approve receipt (hash 0) and burn receipt (hash 1)
async fn mount_source_chain(server: &MockServer, allowance: u128, burn_status: &str) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_call" })))
        .respond_with(rpc_result(json!(format!("0x{:064x}", allowance))))
        .mount(server)
        .await;
    let burn_hash = if allowance > 0 {
        tx_hash(0)
    } else {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "method": "eth_getTransactionReceipt",
                "params": [tx_hash(0)]
            })))
            .respond_with(rpc_result(receipt(&tx_hash(0), "0x1", json!([]))))
            .mount(server)
            .await;
        tx_hash(1)
    };
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "eth_getTransactionReceipt",
            "params": [burn_hash.clone()]
        })))
        .respond_with(rpc_result(receipt(
            &burn_hash,
            burn_status,
            json!([{
                "address": DUMMY_TOKEN_MESSENGER_ADDR,
                "topics": [event_topic("MessageSent(bytes)")],
                "data": message_sent_data(&dummy_message()),
            }]),
        )))
        .mount(server)
        .await;
}

/// Mock destination chain: every receipt is a successful one
async fn mount_destination_chain(server: &MockServer) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_getTransactionReceipt" })))
        .respond_with(rpc_result(receipt(&tx_hash(2), "0x1", json!([]))))
        .mount(server)
        .await;
}

async fn mount_attestation(server: &MockServer, status: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/attestations/{}", message_hash())))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "attestation": format!("0x{}", hex::encode(dummy_attestation())),
            "status": status,
        })))
        .mount(server)
        .await;
}

fn step_states(result: &AdapterResult) -> Vec<(String, AdapterState)> {
    match result {
        AdapterResult::Steps { steps, .. } => {
            steps.iter().map(|s| (s.name.clone(), s.state)).collect()
        }
        AdapterResult::Token(_) => panic!("expected steps"),
    }
}

// ============================================================================
// FULL FLOW
// ============================================================================

/// What is tested: approve -> burn -> attestation -> mint with every call checked
/// Why: End-to-end CCTP flow against mocked chains and attestation service
#[tokio::test]
async fn test_full_bridge_flow() {
    let source_server = MockServer::start().await;
    let destination_server = MockServer::start().await;
    let attestation_server = MockServer::start().await;
    mount_source_chain(&source_server, 0, "0x1").await;
    mount_destination_chain(&destination_server).await;
    mount_attestation(&attestation_server, "complete").await;

    let mut source = create_hub_chain();
    source.rpc_url = source_server.uri();
    let mut destination = create_capable_chain();
    destination.rpc_url = destination_server.uri();
    destination.bundler_url = None;

    let base = Arc::new(MockTransport::succeeding());
    let transport: Arc<dyn Transport> = base.clone();
    let adapter = CctpAdapter::new(create_settings(&attestation_server.uri())).unwrap();
    let result = adapter
        .execute(create_params(source.clone(), destination.clone()), transport)
        .await
        .unwrap();

    assert_eq!(
        step_states(&result),
        vec![
            (STEP_APPROVE.to_string(), AdapterState::Success),
            (STEP_BURN.to_string(), AdapterState::Success),
            (STEP_FETCH_ATTESTATION.to_string(), AdapterState::Success),
            (STEP_MINT.to_string(), AdapterState::Success),
        ]
    );
    let AdapterResult::Steps {
        state,
        source_transaction_hash,
        ..
    } = &result
    else {
        panic!("expected steps");
    };
    assert_eq!(*state, AdapterState::Success);
    assert_eq!(source_transaction_hash.as_deref(), Some(tx_hash(1).as_str()));

    let sent = base.sent_transactions();
    assert_eq!(sent.len(), 3);
    let units = abi::parse_units("2.5", 6).unwrap();
    let approve = &sent[0].params[0];
    assert_eq!(approve["to"], DUMMY_USDC_ADDR);
    assert_eq!(
        approve["data"],
        format!(
            "0x{}",
            hex::encode(abi::erc20_approve_calldata(DUMMY_TOKEN_MESSENGER_ADDR, units).unwrap())
        )
    );
    let burn = &sent[1].params[0];
    assert_eq!(burn["to"], DUMMY_TOKEN_MESSENGER_ADDR);
    assert_eq!(
        burn["data"],
        format!(
            "0x{}",
            hex::encode(
                abi::deposit_for_burn_calldata(units, destination.cctp_domain, DUMMY_RECIPIENT_ADDR, DUMMY_USDC_ADDR)
                    .unwrap()
            )
        )
    );
    let mint = &sent[2].params[0];
    assert_eq!(mint["to"], DUMMY_MESSAGE_TRANSMITTER_ADDR);
    assert_eq!(
        mint["data"],
        format!(
            "0x{}",
            hex::encode(abi::receive_message_calldata(&dummy_message(), &dummy_attestation()))
        )
    );

    // Switched to the source before the approval and to the destination before the mint
    let switches: Vec<u64> = base
        .requests()
        .iter()
        .filter_map(|r| if r.is_switch_chain() { r.target_chain_id() } else { None })
        .collect();
    assert_eq!(switches, vec![source.chain_id, destination.chain_id]);
}

/// What is tested: an allowance that covers the amount skips the approval transaction
/// Why: Re-approving wastes a wallet prompt and gas
#[tokio::test]
async fn test_sufficient_allowance_skips_approval() {
    let source_server = MockServer::start().await;
    let destination_server = MockServer::start().await;
    let attestation_server = MockServer::start().await;
    mount_source_chain(&source_server, u128::MAX, "0x1").await;
    mount_destination_chain(&destination_server).await;
    mount_attestation(&attestation_server, "complete").await;

    let mut source = create_hub_chain();
    source.rpc_url = source_server.uri();
    let mut destination = create_capable_chain();
    destination.rpc_url = destination_server.uri();
    destination.bundler_url = None;

    let base = Arc::new(MockTransport::succeeding());
    let transport: Arc<dyn Transport> = base.clone();
    let adapter = CctpAdapter::new(create_settings(&attestation_server.uri())).unwrap();
    let result = adapter.execute(create_params(source, destination), transport).await.unwrap();

    let AdapterResult::Steps { state, steps, .. } = result else {
        panic!("expected steps");
    };
    assert_eq!(state, AdapterState::Success);
    assert_eq!(steps[0].name, STEP_APPROVE);
    assert!(steps[0].tx_hash.is_none());
    assert_eq!(base.sent_transactions().len(), 2);
}

// ============================================================================
// FAILURES
// ============================================================================

/// What is tested: a reverted burn stops the run before any attestation request
/// Why: Nothing was burned, so the outcome must be an error, not a partial
#[tokio::test]
async fn test_reverted_burn_stops_run() {
    let source_server = MockServer::start().await;
    let attestation_server = MockServer::start().await;
    mount_source_chain(&source_server, 0, "0x0").await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&attestation_server)
        .await;

    let mut source = create_hub_chain();
    source.rpc_url = source_server.uri();

    let transport: Arc<dyn Transport> = Arc::new(MockTransport::succeeding());
    let adapter = CctpAdapter::new(create_settings(&attestation_server.uri())).unwrap();
    let result = adapter
        .execute(create_params(source, create_capable_chain()), transport)
        .await
        .unwrap();

    assert_eq!(
        step_states(&result),
        vec![
            (STEP_APPROVE.to_string(), AdapterState::Success),
            (STEP_BURN.to_string(), AdapterState::Error),
        ]
    );
    let AdapterResult::Steps { steps, source_transaction_hash, .. } = result else {
        panic!("expected steps");
    };
    assert!(steps[1].error_message.as_deref().unwrap().contains("reverted"));
    assert!(source_transaction_hash.is_none());
}

/// What is tested: an attestation that never completes fails after the configured timeout
/// Why: The wait is bounded; the burn hash is still reported
#[tokio::test]
async fn test_attestation_timeout() {
    let source_server = MockServer::start().await;
    let attestation_server = MockServer::start().await;
    mount_source_chain(&source_server, 0, "0x1").await;
    mount_attestation(&attestation_server, "pending_confirmations").await;

    let mut source = create_hub_chain();
    source.rpc_url = source_server.uri();
    let mut settings = create_settings(&attestation_server.uri());
    settings.attestation_timeout = Duration::from_millis(100);

    let transport: Arc<dyn Transport> = Arc::new(MockTransport::succeeding());
    let adapter = CctpAdapter::new(settings).unwrap();
    let result = adapter
        .execute(create_params(source, create_capable_chain()), transport)
        .await
        .unwrap();

    let AdapterResult::Steps { state, steps, source_transaction_hash } = result else {
        panic!("expected steps");
    };
    assert_eq!(state, AdapterState::Error);
    assert_eq!(steps.last().unwrap().name, STEP_FETCH_ATTESTATION);
    assert!(steps.last().unwrap().error_message.as_deref().unwrap().contains("not available"));
    assert_eq!(source_transaction_hash, Some(tx_hash(1)));
}

/// What is tested: a zero or malformed amount fails before any transaction
/// Why: Nothing must be sent for an amount that converts to zero base units
#[tokio::test]
async fn test_invalid_amount_is_rejected() {
    let base = Arc::new(MockTransport::succeeding());
    let transport: Arc<dyn Transport> = base.clone();
    let adapter = CctpAdapter::new(create_settings("http://127.0.0.1:1")).unwrap();

    let mut params = create_params(create_hub_chain(), create_capable_chain());
    params.amount = "0.0000001".to_string();
    let err = adapter.execute(params, transport).await.unwrap_err();
    assert!(matches!(err, AdapterError::InvalidAmount(_)));
    assert!(base.requests().is_empty());
}
