//! Balance Reader
//!
//! Reads the user's USDC balance on every configured chain at once. A chain whose read
//! fails reports zero together with the reason; the batch itself never fails.

use anyhow::Result;
use chain_clients_evm::EvmClient;
use ethereum_types::U256;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, error};

use crate::abi;
use crate::chains::ChainDescriptor;

/// Balance of one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainBalance {
    pub chain_id: u64,
    pub display_name: String,
    /// Base units as a decimal string
    pub units: String,
    /// Human-readable amount (`units` scaled by the token decimals)
    pub formatted: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

async fn query_balance(chain: &ChainDescriptor, owner: &str) -> Result<(U256, u8)> {
    let client = EvmClient::new(&chain.rpc_url)?;
    let data = abi::erc20_balance_of_calldata(owner)?;
    let output = client.call(&chain.usdc_addr, &data).await?;
    let units = abi::decode_u256(&output)?;
    let decimals = match chain.usdc_decimals {
        Some(decimals) => decimals,
        None => client.erc20_decimals(&chain.usdc_addr).await?,
    };
    Ok((units, decimals))
}

/// Reads `owner`'s balance on each chain concurrently, in the order given.
pub async fn fetch_balances(chains: &[ChainDescriptor], owner: &str) -> Vec<ChainBalance> {
    let reads = chains.iter().map(|chain| async move {
        match query_balance(chain, owner).await {
            Ok((units, decimals)) => {
                debug!("Balance on {}: {} base units", chain.display_name, units);
                ChainBalance {
                    chain_id: chain.chain_id,
                    display_name: chain.display_name.clone(),
                    units: units.to_string(),
                    formatted: abi::format_units(units, decimals),
                    error: None,
                }
            }
            Err(e) => {
                error!(
                    "Failed to read balance on {} (chain {}): {:#}",
                    chain.display_name, chain.chain_id, e
                );
                ChainBalance {
                    chain_id: chain.chain_id,
                    display_name: chain.display_name.clone(),
                    units: "0".to_string(),
                    formatted: "0".to_string(),
                    error: Some(format!("{:#}", e)),
                }
            }
        }
    });
    join_all(reads).await
}
