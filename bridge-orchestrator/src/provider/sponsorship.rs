//! Sponsorship layer: turns eligible steps into gas-sponsored operations.
//!
//! Steps the policy declines go directly to the base transport, bypassing the
//! annotation layer. A failure on the sponsored path is returned as
//! [`ProviderError::Sponsorship`] and never retried with the user's own gas.

use async_trait::async_trait;
use chain_clients_common::{addresses_equal, to_hex_quantity};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::session::SessionCache;
use super::{IntentSender, RunContext};
use crate::chains::ChainDescriptor;
use crate::classifier::TransactionIntent;
use crate::config::SponsorshipConfig;
use crate::crypto::{AuthorizationRequest, AuthorizationSigner};
use crate::errors::{ProviderError, SponsorshipError};
use crate::policy::SponsorshipPolicy;
use crate::transport::{result_hash, RpcRequest, Transport, ETH_SEND_USER_OPERATION};

/// Operation submitted to the bundler in place of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsoredOperation {
    pub sender: String,
    pub chain_id: String,
    pub to: String,
    pub value: String,
    pub data: String,
    pub authorization: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paymaster_policy_id: Option<String>,
}

pub struct SponsorshipLayer {
    inner: Arc<dyn IntentSender>,
    base: Arc<dyn Transport>,
    run: Arc<RunContext>,
    policy: SponsorshipPolicy,
    sessions: SessionCache,
    signer: Option<Arc<dyn AuthorizationSigner>>,
}

impl SponsorshipLayer {
    pub fn new(
        inner: Arc<dyn IntentSender>,
        base: Arc<dyn Transport>,
        run: Arc<RunContext>,
        config: SponsorshipConfig,
        signer: Option<Arc<dyn AuthorizationSigner>>,
    ) -> Self {
        let sessions = SessionCache::new(run.owner.clone(), config);
        Self {
            inner,
            base,
            run,
            policy: SponsorshipPolicy,
            sessions,
            signer,
        }
    }

    /// Whether the intent is sponsored in this run.
    fn should_sponsor(&self, intent: &TransactionIntent) -> Option<ChainDescriptor> {
        let decision = self.policy.decide(
            &self.run.source,
            &self.run.destination,
            intent.kind,
            self.run.sponsorship_enabled,
        );
        if !decision.sponsor {
            return None;
        }
        if decision.target_chain.chain_id != intent.chain_id {
            warn!(
                "{:?} step sent on chain {} but hosted on chain {}, not sponsoring",
                intent.kind, intent.chain_id, decision.target_chain.chain_id
            );
            return None;
        }
        Some(decision.target_chain)
    }

    async fn submit(
        &self,
        intent: &TransactionIntent,
        chain: &ChainDescriptor,
    ) -> Result<String, SponsorshipError> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| SponsorshipError::Signing("no authorization signer is configured".to_string()))?;
        let session = self.sessions.get(chain).await?;
        // Only the owner's key can delegate the owner's account.
        let signer_address = signer.address();
        if !addresses_equal(&signer_address, &session.owner) {
            return Err(SponsorshipError::OwnerMismatch {
                signer: signer_address,
                owner: session.owner.clone(),
            });
        }

        // Fresh nonce on every call; a stale one invalidates the authorization.
        let nonce = session
            .public
            .get_transaction_count(&session.owner, "pending")
            .await
            .map_err(|e| SponsorshipError::Nonce(format!("{:#}", e)))?;

        let authorization = signer
            .sign_authorization(&AuthorizationRequest {
                chain_id: chain.chain_id,
                address: session.delegation_contract.clone(),
                nonce,
            })
            .await
            .map_err(|e| SponsorshipError::Signing(format!("{:#}", e)))?;

        let operation = SponsoredOperation {
            sender: session.owner.clone(),
            chain_id: to_hex_quantity(chain.chain_id),
            to: intent.to.clone(),
            value: intent.value.clone().unwrap_or_else(|| "0x0".to_string()),
            data: format!("0x{}", hex::encode(&intent.data)),
            authorization: authorization.to_rpc_json(),
            paymaster_policy_id: session.paymaster_policy_id.clone(),
        };
        let operation = serde_json::to_value(&operation)
            .map_err(|e| SponsorshipError::Bundler(e.to_string()))?;

        let hash: String = session
            .bundler
            .request(ETH_SEND_USER_OPERATION, vec![operation])
            .await
            .map_err(|e| SponsorshipError::Bundler(format!("{:#}", e)))?;
        info!(
            "Sponsored {:?} submitted on chain {}: {}",
            intent.kind, chain.chain_id, hash
        );
        Ok(hash)
    }
}

#[async_trait]
impl IntentSender for SponsorshipLayer {
    async fn send(&self, intent: TransactionIntent) -> Result<String, ProviderError> {
        self.inner.announce(&intent);
        let step = intent.kind.step_name();

        let hash = match self.should_sponsor(&intent) {
            Some(chain) => self.submit(&intent, &chain).await?,
            None => {
                let result = self
                    .base
                    .request(RpcRequest::send_transaction(intent.tx.clone()))
                    .await?;
                result_hash(&result)?
            }
        };

        if let Some(step) = step {
            self.run.reporter.submitted(step, hash.clone());
        }
        Ok(hash)
    }
}
