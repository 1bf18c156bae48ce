//! Attestation API Client
//!
//! Polls Circle's attestation service (Iris) for the attestation of a burn message.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Response of `GET /v1/attestations/{messageHash}`.
#[derive(Debug, Clone, Deserialize)]
pub struct AttestationResponse {
    /// Hex attestation, or "PENDING" while not yet available
    #[serde(default)]
    pub attestation: Option<String>,
    /// "pending_confirmations" or "complete"
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct AttestationClient {
    client: reqwest::Client,
    base_url: String,
}

impl AttestationClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .no_proxy()
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetches the attestation once.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(bytes))` - Attestation is complete
    /// * `Ok(None)` - Not available yet (unknown message or pending confirmations)
    /// * `Err(anyhow::Error)` - Request failed
    pub async fn fetch(&self, message_hash: &str) -> Result<Option<Vec<u8>>> {
        let url = format!("{}/v1/attestations/{}", self.base_url, message_hash);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send GET /v1/attestations request")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            anyhow::bail!("Attestation API returned {}", response.status());
        }

        let body: AttestationResponse = response
            .json()
            .await
            .context("Failed to parse GET /v1/attestations response")?;

        if body.status != "complete" {
            debug!("Attestation for {} is {}", message_hash, body.status);
            return Ok(None);
        }
        let attestation = body
            .attestation
            .ok_or_else(|| anyhow::anyhow!("Attestation marked complete but missing"))?;
        let bytes = hex::decode(attestation.trim_start_matches("0x"))
            .context("Attestation is not valid hex")?;
        Ok(Some(bytes))
    }

    /// Polls until the attestation is complete or `timeout` elapses.
    ///
    /// Transient request failures are retried until the deadline.
    pub async fn wait_for_attestation(
        &self,
        message_hash: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut last_error = None;
        info!("Waiting for attestation of message {}", message_hash);

        loop {
            match self.fetch(message_hash).await {
                Ok(Some(attestation)) => {
                    info!("Attestation received for message {}", message_hash);
                    return Ok(attestation);
                }
                Ok(None) => {}
                Err(e) => {
                    debug!("Attestation poll failed: {:#}", e);
                    last_error = Some(e);
                }
            }

            if Instant::now() + poll_interval > deadline {
                let reason = last_error
                    .map(|e| format!(" (last error: {:#})", e))
                    .unwrap_or_default();
                anyhow::bail!(
                    "Attestation for message {} not available after {}s{}",
                    message_hash,
                    timeout.as_secs(),
                    reason
                );
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}
