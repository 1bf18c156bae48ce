//! Chain descriptors and the registry that resolves them by chain id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::{BridgeConfig, ChainConfig};

/// Role of a chain in the bridge topology.
///
/// The hub is the designated chain on which gas sponsorship is never applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainRole {
    #[default]
    Ordinary,
    Hub,
}

/// Immutable description of one supported network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDescriptor {
    pub chain_id: u64,
    pub display_name: String,
    pub role: ChainRole,
    /// Whether the sponsorship infrastructure (bundler + paymaster) exists on this chain
    pub sponsorship_capable: bool,
    pub rpc_url: String,
    pub explorer_url: String,
    pub bundler_url: Option<String>,
    pub usdc_addr: String,
    pub usdc_decimals: Option<u8>,
    pub token_messenger_addr: String,
    pub message_transmitter_addr: String,
    pub cctp_domain: u32,
}

impl ChainDescriptor {
    pub fn is_hub(&self) -> bool {
        self.role == ChainRole::Hub
    }

    /// Explorer link for a transaction hash, or None when no explorer is configured.
    pub fn explorer_tx_url(&self, tx_hash: &str) -> Option<String> {
        if self.explorer_url.is_empty() {
            return None;
        }
        Some(format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), tx_hash))
    }
}

impl From<&ChainConfig> for ChainDescriptor {
    fn from(config: &ChainConfig) -> Self {
        Self {
            chain_id: config.chain_id,
            display_name: config.name.clone(),
            role: config.role,
            sponsorship_capable: config.sponsorship_capable,
            rpc_url: config.rpc_url.clone(),
            explorer_url: config.explorer_url.clone(),
            bundler_url: config.bundler_url.clone(),
            usdc_addr: config.usdc_addr.clone(),
            usdc_decimals: config.usdc_decimals,
            token_messenger_addr: config.token_messenger_addr.clone(),
            message_transmitter_addr: config.message_transmitter_addr.clone(),
            cctp_domain: config.cctp_domain,
        }
    }
}

/// Resolves chain ids to descriptors.
pub trait ChainRegistry: Send + Sync {
    /// Returns the descriptor for `chain_id`, or None for an unknown chain.
    fn describe(&self, chain_id: u64) -> Option<ChainDescriptor>;

    /// All known chains, ordered by chain id.
    fn all(&self) -> Vec<ChainDescriptor>;
}

/// Registry backed by a fixed set of descriptors.
#[derive(Debug, Clone, Default)]
pub struct StaticChainRegistry {
    chains: HashMap<u64, ChainDescriptor>,
}

impl StaticChainRegistry {
    pub fn new(descriptors: impl IntoIterator<Item = ChainDescriptor>) -> Self {
        Self {
            chains: descriptors.into_iter().map(|d| (d.chain_id, d)).collect(),
        }
    }

    /// Builds the registry from the `[[chain]]` entries of a validated config.
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.chain.iter().map(ChainDescriptor::from))
    }
}

impl ChainRegistry for StaticChainRegistry {
    fn describe(&self, chain_id: u64) -> Option<ChainDescriptor> {
        self.chains.get(&chain_id).cloned()
    }

    fn all(&self) -> Vec<ChainDescriptor> {
        let mut chains: Vec<_> = self.chains.values().cloned().collect();
        chains.sort_by_key(|c| c.chain_id);
        chains
    }
}
