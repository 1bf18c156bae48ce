//! Configuration Management Module
//!
//! This module handles loading and validating configuration for the bridge orchestrator.
//! Configuration includes the chain registry, the user's wallet, sponsorship settings,
//! attestation polling, and classifier tuning.

use chain_clients_common::is_valid_evm_address;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::chains::ChainRole;

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure containing all orchestrator settings.
///
/// This structure holds configuration for:
/// - Service behavior (sponsorship switch, attestation and receipt polling)
/// - The user's wallet (address and key source)
/// - Sponsorship (delegation contract, paymaster policy)
/// - Transaction classifier tuning
/// - Chains (use [[chain]] in TOML, one entry per network)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Service configuration
    pub service: ServiceConfig,
    /// Wallet configuration
    pub wallet: WalletConfig,
    /// Sponsorship configuration
    #[serde(default)]
    pub sponsorship: SponsorshipConfig,
    /// Classifier configuration
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Chain configurations (use [[chain]] in TOML for multiple)
    #[serde(default)]
    pub chain: Vec<ChainConfig>,
}

/// Service-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Global switch: when false no step is ever sponsored
    #[serde(default)]
    pub sponsorship_enabled: bool,
    /// Attestation service base URL (e.g., "https://iris-api-sandbox.circle.com")
    #[serde(default = "default_attestation_api_url")]
    pub attestation_api_url: String,
    /// Upper bound on the wait for an attestation in milliseconds
    #[serde(default = "default_attestation_timeout_ms")]
    pub attestation_timeout_ms: u64,
    /// Interval between attestation polls in milliseconds
    #[serde(default = "default_attestation_poll_interval_ms")]
    pub attestation_poll_interval_ms: u64,
    /// Upper bound on the wait for a transaction receipt in milliseconds
    #[serde(default = "default_receipt_timeout_ms")]
    pub receipt_timeout_ms: u64,
    /// Interval between receipt polls in milliseconds
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
}

/// Wallet configuration for the user on whose behalf transfers run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// User address (0x-prefixed hex)
    pub address: String,
    /// Environment variable name containing the user's secp256k1 private key (hex)
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,
}

/// Sponsorship configuration shared by every sponsorship-capable chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SponsorshipConfig {
    /// Delegation contract the user's account is delegated to for sponsored calls
    #[serde(default)]
    pub delegation_contract_addr: Option<String>,
    /// Paymaster sponsorship policy reference (optional)
    #[serde(default)]
    pub paymaster_policy_id: Option<String>,
}

/// Transaction classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Classify unrecognized call data longer than the threshold as Mint
    #[serde(default)]
    pub mint_length_fallback: bool,
    /// Call data length (bytes) above which the Mint fallback applies
    #[serde(default = "default_mint_length_threshold")]
    pub mint_length_threshold: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            mint_length_fallback: false,
            mint_length_threshold: default_mint_length_threshold(),
        }
    }
}

/// Configuration for one EVM network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Human-readable name for the chain
    pub name: String,
    /// Chain ID (e.g., 84532 for Base Sepolia)
    pub chain_id: u64,
    /// Role: "ordinary" or "hub"
    #[serde(default)]
    pub role: ChainRole,
    /// Whether steps hosted on this chain may be sponsored
    #[serde(default)]
    pub sponsorship_capable: bool,
    /// RPC endpoint URL
    pub rpc_url: String,
    /// Block explorer base URL
    #[serde(default)]
    pub explorer_url: String,
    /// Bundler / paymaster endpoint URL (required when sponsorship_capable)
    #[serde(default)]
    pub bundler_url: Option<String>,
    /// USDC token contract address
    pub usdc_addr: String,
    /// USDC decimals; resolved from the token contract when absent
    #[serde(default)]
    pub usdc_decimals: Option<u8>,
    /// CCTP TokenMessenger contract address
    pub token_messenger_addr: String,
    /// CCTP MessageTransmitter contract address
    pub message_transmitter_addr: String,
    /// CCTP domain identifier
    pub cctp_domain: u32,
}

fn default_attestation_api_url() -> String {
    "https://iris-api.circle.com".to_string()
}

fn default_attestation_timeout_ms() -> u64 {
    30 * 60 * 1000
}

fn default_attestation_poll_interval_ms() -> u64 {
    5000
}

fn default_receipt_timeout_ms() -> u64 {
    3 * 60 * 1000
}

fn default_receipt_poll_interval_ms() -> u64 {
    2000
}

fn default_private_key_env() -> String {
    "BRIDGE_USER_PRIVATE_KEY".to_string()
}

fn default_mint_length_threshold() -> usize {
    256
}

impl BridgeConfig {
    /// Loads configuration from a TOML file.
    ///
    /// This function:
    /// 1. Uses the provided path, else BRIDGE_CONFIG_PATH, else config/bridge.toml
    /// 2. If the file exists, loads and parses the configuration
    /// 3. Validates the configuration
    /// 4. If it doesn't exist, returns an error asking user to copy the template
    ///
    /// # Arguments
    ///
    /// * `path` - Optional path to config file. If None, uses BRIDGE_CONFIG_PATH env var or default.
    ///
    /// # Returns
    ///
    /// * `Ok(BridgeConfig)` - Successfully loaded and validated configuration
    /// * `Err(anyhow::Error)` - Failed to load configuration, file doesn't exist, or validation failed
    pub fn load_from_path(path: Option<&str>) -> anyhow::Result<Self> {
        let config_path = path
            .map(|p| p.to_string())
            .or_else(|| std::env::var("BRIDGE_CONFIG_PATH").ok())
            .unwrap_or_else(|| "config/bridge.toml".to_string());

        if std::path::Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: BridgeConfig = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/bridge.template.toml config/bridge.toml\n\
                Then edit config/bridge.toml with your actual values.",
                config_path
            ))
        }
    }

    /// Loads configuration from the default location.
    ///
    /// This is equivalent to calling `load_from_path(None)`.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from_path(None)
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// Checks:
    /// - At least one chain is configured, chain IDs are unique, at most one hub
    /// - The hub is not sponsorship-capable and capable chains have a bundler URL
    /// - A delegation contract is configured when any chain is capable
    /// - Addresses and URLs are well-formed, timeouts are positive
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Configuration is valid
    /// * `Err(anyhow::Error)` - Validation failed with error message
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chain.is_empty() {
            return Err(anyhow::anyhow!(
                "Configuration error: At least one [[chain]] must be configured"
            ));
        }

        let mut seen = HashSet::new();
        for chain in &self.chain {
            if !seen.insert(chain.chain_id) {
                return Err(anyhow::anyhow!(
                    "Configuration error: Chain ID {} is configured more than once",
                    chain.chain_id
                ));
            }
        }

        let hub_count = self.chain.iter().filter(|c| c.role == ChainRole::Hub).count();
        if hub_count > 1 {
            return Err(anyhow::anyhow!(
                "Configuration error: At most one chain may have role \"hub\", found {}",
                hub_count
            ));
        }

        validate_address(&self.wallet.address)
            .map_err(|e| anyhow::anyhow!("Invalid wallet address: {}", e))?;

        for chain in &self.chain {
            chain.validate()?;
        }

        if self.chain.iter().any(|c| c.sponsorship_capable) {
            let delegation = self.sponsorship.delegation_contract_addr.as_deref().ok_or_else(|| {
                anyhow::anyhow!(
                    "Configuration error: [sponsorship] delegation_contract_addr is required when a chain is sponsorship_capable"
                )
            })?;
            validate_address(delegation)
                .map_err(|e| anyhow::anyhow!("Invalid delegation_contract_addr: {}", e))?;
        }

        url::Url::parse(&self.service.attestation_api_url)
            .map_err(|e| anyhow::anyhow!("Invalid attestation_api_url: {}", e))?;

        if self.service.attestation_timeout_ms == 0 || self.service.receipt_timeout_ms == 0 {
            anyhow::bail!("Configuration error: timeouts must be positive");
        }
        if self.service.attestation_poll_interval_ms == 0 || self.service.receipt_poll_interval_ms == 0 {
            anyhow::bail!("Configuration error: poll intervals must be positive");
        }

        Ok(())
    }
}

impl ChainConfig {
    /// Validates a single chain entry.
    fn validate(&self) -> anyhow::Result<()> {
        if self.role == ChainRole::Hub && self.sponsorship_capable {
            anyhow::bail!(
                "Configuration error: Hub chain {} ({}) cannot be sponsorship_capable",
                self.name,
                self.chain_id
            );
        }

        if self.sponsorship_capable {
            let bundler = self.bundler_url.as_deref().ok_or_else(|| {
                anyhow::anyhow!(
                    "Configuration error: Chain {} ({}) is sponsorship_capable but has no bundler_url",
                    self.name,
                    self.chain_id
                )
            })?;
            url::Url::parse(bundler)
                .map_err(|e| anyhow::anyhow!("Invalid bundler_url for chain {}: {}", self.chain_id, e))?;
        }

        url::Url::parse(&self.rpc_url)
            .map_err(|e| anyhow::anyhow!("Invalid rpc_url for chain {}: {}", self.chain_id, e))?;

        for (field, value) in [
            ("usdc_addr", &self.usdc_addr),
            ("token_messenger_addr", &self.token_messenger_addr),
            ("message_transmitter_addr", &self.message_transmitter_addr),
        ] {
            validate_address(value)
                .map_err(|e| anyhow::anyhow!("Invalid {} for chain {}: {}", field, self.chain_id, e))?;
        }

        Ok(())
    }
}

/// Validates a `0x`-prefixed 20-byte EVM address.
///
/// # Returns
///
/// - `Ok(())` - Address format is valid
/// - `Err(anyhow::Error)` - Address format is invalid
fn validate_address(address: &str) -> anyhow::Result<()> {
    if !address.starts_with("0x") {
        anyhow::bail!("EVM address must be 0x-prefixed hex string");
    }
    if !is_valid_evm_address(address) {
        anyhow::bail!("Expected 20-byte hex address, got {}", address);
    }
    Ok(())
}
