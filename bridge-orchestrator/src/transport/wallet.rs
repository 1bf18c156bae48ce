//! JSON-RPC Wallet Transport
//!
//! Base transport for the CLI. Transactions go to the active chain's RPC endpoint
//! as `eth_sendTransaction` from the configured wallet address, which the node (or
//! a signing proxy in front of it) must manage. Chain switching is handled locally
//! against the registry.

use async_trait::async_trait;
use chain_clients_evm::EvmClient;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::{parse_chain_id, RpcRequest, Transport, ETH_SEND_TRANSACTION, WALLET_ADD_ETHEREUM_CHAIN};
use crate::chains::ChainRegistry;
use crate::errors::ProviderError;

/// EIP-1193 "Unrecognized chain ID"
const CODE_UNRECOGNIZED_CHAIN: i64 = 4902;

pub struct RpcWalletTransport {
    from: String,
    active_chain: AtomicU64,
    clients: HashMap<u64, EvmClient>,
}

impl RpcWalletTransport {
    /// Creates a transport sending from `from`, initially on `initial_chain`.
    pub fn new(
        registry: Arc<dyn ChainRegistry>,
        from: &str,
        initial_chain: u64,
    ) -> anyhow::Result<Self> {
        let mut clients = HashMap::new();
        for chain in registry.all() {
            clients.insert(chain.chain_id, EvmClient::new(&chain.rpc_url)?);
        }
        if !clients.contains_key(&initial_chain) {
            anyhow::bail!("Initial chain {} is not configured", initial_chain);
        }
        Ok(Self {
            from: from.to_string(),
            active_chain: AtomicU64::new(initial_chain),
            clients,
        })
    }

    pub fn active_chain(&self) -> u64 {
        self.active_chain.load(Ordering::SeqCst)
    }

    fn client(&self, chain_id: u64) -> Result<&EvmClient, ProviderError> {
        self.clients.get(&chain_id).ok_or_else(|| ProviderError::Rpc {
            code: CODE_UNRECOGNIZED_CHAIN,
            message: format!("Unrecognized chain ID {}", chain_id),
        })
    }

    async fn send_transaction(&self, request: RpcRequest) -> Result<Value, ProviderError> {
        // Only the transaction object is forwarded; UI metadata stays behind.
        let mut tx = request
            .params
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidRequest("eth_sendTransaction without a transaction".to_string()))?;
        let chain_id = tx
            .get("chainId")
            .and_then(parse_chain_id)
            .unwrap_or_else(|| self.active_chain());
        if let Some(obj) = tx.as_object_mut() {
            obj.insert("from".to_string(), Value::String(self.from.clone()));
        }

        let client = self.client(chain_id)?;
        debug!("Forwarding eth_sendTransaction to chain {}", chain_id);
        let hash: Value = client
            .request(ETH_SEND_TRANSACTION, vec![tx])
            .await
            .map_err(|e| ProviderError::from_transport(&e))?;
        Ok(hash)
    }
}

#[async_trait]
impl Transport for RpcWalletTransport {
    async fn request(&self, request: RpcRequest) -> Result<Value, ProviderError> {
        if request.method == ETH_SEND_TRANSACTION {
            return self.send_transaction(request).await;
        }

        if request.is_switch_chain() {
            let chain_id = request.target_chain_id().ok_or_else(|| {
                ProviderError::InvalidRequest(format!("{} without a chainId", request.method))
            })?;
            self.client(chain_id)?;
            self.active_chain.store(chain_id, Ordering::SeqCst);
            info!("Switched active chain to {}", chain_id);
            return Ok(Value::Null);
        }

        if request.method == WALLET_ADD_ETHEREUM_CHAIN {
            // Chains come from the registry; adding is accepted only for known ones.
            let chain_id = request.target_chain_id().ok_or_else(|| {
                ProviderError::InvalidRequest("wallet_addEthereumChain without a chainId".to_string())
            })?;
            self.client(chain_id)?;
            return Ok(Value::Null);
        }

        let client = self.client(self.active_chain())?;
        let result: Option<Value> = client
            .request_optional(&request.method, request.params)
            .await
            .map_err(|e| ProviderError::from_transport(&e))?;
        Ok(result.unwrap_or(Value::Null))
    }
}
