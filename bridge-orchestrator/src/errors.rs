//! Error Types
//!
//! Typed errors for the orchestration core. Infrastructure code (config loading,
//! JSON-RPC plumbing, the CLI) uses `anyhow`; everything that reaches the
//! orchestrator's outcome reduction is one of the enums below.

use chain_clients_evm::RpcError;
use thiserror::Error;

/// Canonical message for timeouts
pub const MSG_TIMEOUT: &str = "Request timed out. Please try again.";
/// Canonical message for wallet-side rejection (including EIP-1193 code 4001)
pub const MSG_USER_REJECTED: &str = "Transaction was rejected in the wallet.";
/// Canonical message for a blocked wallet popup
pub const MSG_POPUP_BLOCKED: &str =
    "Wallet popup was blocked. Allow popups for this site and try again.";

/// EIP-1193 "User Rejected Request"
pub const CODE_USER_REJECTED: i64 = 4001;

/// Request rejected before any chain call or progress event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid amount '{0}': enter a decimal number greater than zero")]
    InvalidAmount(String),

    #[error("Invalid user address: {0}")]
    InvalidUserAddress(String),

    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),

    #[error("A recipient address is required for a same-network transfer")]
    RecipientRequired,

    #[error("Cannot send to your own address on the same network")]
    SelfTransfer,

    #[error("Unsupported chain: {0}")]
    UnknownChain(u64),
}

/// Failure to turn a step into a sponsored operation.
///
/// Always fatal for the run: a sponsored step never falls back to user-paid gas.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SponsorshipError {
    #[error("Chain {0} does not support gas sponsorship")]
    ChainNotSponsorable(u64),

    #[error("Chain {0} has no bundler endpoint configured")]
    MissingBundler(u64),

    #[error("No delegation contract configured for sponsored operations")]
    MissingDelegationContract,

    #[error("Failed to set up sponsored session on chain {chain_id}: {message}")]
    Session { chain_id: u64, message: String },

    #[error("Failed to fetch account nonce: {0}")]
    Nonce(String),

    #[error("Failed to sign delegation authorization: {0}")]
    Signing(String),

    #[error("Authorization signer {signer} does not control the transferring account {owner}")]
    OwnerMismatch { signer: String, owner: String },

    #[error("Bundler rejected sponsored operation: {0}")]
    Bundler(String),
}

/// Failure reported by the provider chain for a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("{}", MSG_TIMEOUT)]
    Timeout,

    #[error("{}", MSG_USER_REJECTED)]
    UserRejected,

    #[error("{}", MSG_POPUP_BLOCKED)]
    PopupBlocked,

    /// Error object from the endpoint, message kept verbatim
    #[error("{message}")]
    Rpc { code: i64, message: String },

    #[error("Gas sponsorship failed: {0}")]
    Sponsorship(#[from] SponsorshipError),

    #[error("Transfer aborted after a sponsorship failure; no further transactions were sent")]
    RunAborted,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Any other transport failure, message kept verbatim
    #[error("{0}")]
    Transport(String),
}

impl ProviderError {
    /// Maps a raw failure onto the canonical variants, keeping anything unrecognized verbatim.
    pub fn normalize(code: Option<i64>, message: &str) -> Self {
        if code == Some(CODE_USER_REJECTED) {
            return ProviderError::UserRejected;
        }
        match canonical_message(message) {
            Some(MSG_TIMEOUT) => ProviderError::Timeout,
            Some(MSG_USER_REJECTED) => ProviderError::UserRejected,
            Some(MSG_POPUP_BLOCKED) => ProviderError::PopupBlocked,
            _ => match code {
                Some(code) => ProviderError::Rpc {
                    code,
                    message: message.to_string(),
                },
                None => ProviderError::Transport(message.to_string()),
            },
        }
    }

    /// Converts an infrastructure error from the JSON-RPC client.
    pub fn from_transport(err: &anyhow::Error) -> Self {
        let timed_out = err.chain().any(|cause| {
            cause
                .downcast_ref::<reqwest::Error>()
                .map(|e| e.is_timeout())
                .unwrap_or(false)
        });
        if timed_out {
            return ProviderError::Timeout;
        }
        match err.downcast_ref::<RpcError>() {
            Some(rpc) => ProviderError::normalize(Some(rpc.code), &rpc.message),
            None => ProviderError::normalize(None, &format!("{:#}", err)),
        }
    }

    /// Whether this failure must abort the rest of the run.
    pub fn aborts_run(&self) -> bool {
        matches!(self, ProviderError::Sponsorship(_) | ProviderError::RunAborted)
    }
}

/// Recognizes the few failure phrasings that get a canonical user-facing message.
fn canonical_message(message: &str) -> Option<&'static str> {
    let lower = message.to_ascii_lowercase();
    if lower.contains("timed out") || lower.contains("timeout") {
        Some(MSG_TIMEOUT)
    } else if lower.contains("user rejected")
        || lower.contains("user denied")
        || lower.contains("rejected by user")
        || lower.contains("user cancelled")
    {
        Some(MSG_USER_REJECTED)
    } else if lower.contains("popup") && lower.contains("block") {
        Some(MSG_POPUP_BLOCKED)
    } else {
        None
    }
}

/// Canonical user-facing phrasing of an arbitrary failure message.
pub fn user_facing_message(message: &str) -> String {
    canonical_message(message)
        .map(str::to_string)
        .unwrap_or_else(|| message.to_string())
}

/// Failure of the bridge adapter itself, as opposed to a failed step it reports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("Bridge setup failed: {0}")]
    Setup(String),

    #[error("Invalid bridge amount: {0}")]
    InvalidAmount(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Error returned by `BridgeOrchestrator::transfer` instead of an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("A transfer is already in progress")]
    InFlight,

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_4001_is_user_rejection() {
        assert_eq!(
            ProviderError::normalize(Some(4001), "anything"),
            ProviderError::UserRejected
        );
    }

    #[test]
    fn test_canonical_phrasings() {
        assert_eq!(ProviderError::normalize(None, "Request timed out after 30s").to_string(), MSG_TIMEOUT);
        assert_eq!(
            ProviderError::normalize(None, "User rejected the request.").to_string(),
            MSG_USER_REJECTED
        );
        assert_eq!(
            ProviderError::normalize(None, "Popup window was blocked by the browser").to_string(),
            MSG_POPUP_BLOCKED
        );
    }

    #[test]
    fn test_other_messages_pass_through() {
        let err = ProviderError::normalize(Some(-32000), "insufficient funds for gas");
        assert_eq!(err.to_string(), "insufficient funds for gas");
        assert_eq!(user_facing_message("execution reverted"), "execution reverted");
    }
}
