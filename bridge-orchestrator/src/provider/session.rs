//! Smart-Account Session Cache
//!
//! Per-run cache of the clients used to submit sponsored operations on a chain.
//! Sessions are created on first use and dropped with the run.

use chain_clients_evm::EvmClient;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::chains::ChainDescriptor;
use crate::config::SponsorshipConfig;
use crate::errors::SponsorshipError;

/// Handle for submitting sponsored operations on one chain.
#[derive(Debug, Clone)]
pub struct SmartAccountSession {
    pub chain_id: u64,
    /// Address of the delegated account (the user's key)
    pub owner: String,
    pub delegation_contract: String,
    /// Bundler / paymaster endpoint
    pub bundler: EvmClient,
    /// Chain RPC for nonce reads
    pub public: EvmClient,
    pub paymaster_policy_id: Option<String>,
}

pub struct SessionCache {
    owner: String,
    config: SponsorshipConfig,
    sessions: Mutex<HashMap<u64, Arc<SmartAccountSession>>>,
}

impl SessionCache {
    pub fn new(owner: impl Into<String>, config: SponsorshipConfig) -> Self {
        Self {
            owner: owner.into().to_lowercase(),
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the session for `chain`, creating it on first use.
    ///
    /// Rejects chains that are not sponsorship-capable or have no bundler regardless
    /// of what the policy decided.
    pub async fn get(&self, chain: &ChainDescriptor) -> Result<Arc<SmartAccountSession>, SponsorshipError> {
        if !chain.sponsorship_capable || chain.is_hub() {
            return Err(SponsorshipError::ChainNotSponsorable(chain.chain_id));
        }

        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get(&chain.chain_id) {
            return Ok(session.clone());
        }

        let bundler_url = chain
            .bundler_url
            .as_deref()
            .ok_or(SponsorshipError::MissingBundler(chain.chain_id))?;
        let delegation_contract = self
            .config
            .delegation_contract_addr
            .clone()
            .ok_or(SponsorshipError::MissingDelegationContract)?;

        let session_error = |e: anyhow::Error| SponsorshipError::Session {
            chain_id: chain.chain_id,
            message: e.to_string(),
        };
        let session = Arc::new(SmartAccountSession {
            chain_id: chain.chain_id,
            owner: self.owner.clone(),
            delegation_contract,
            bundler: EvmClient::new(bundler_url).map_err(session_error)?,
            public: EvmClient::new(&chain.rpc_url).map_err(session_error)?,
            paymaster_policy_id: self.config.paymaster_policy_id.clone(),
        });
        info!(
            "Created sponsored session for {} on chain {} ({})",
            self.owner, chain.chain_id, chain.display_name
        );
        sessions.insert(chain.chain_id, session.clone());
        Ok(session)
    }

    /// Number of sessions created so far in this run.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
