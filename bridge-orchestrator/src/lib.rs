//! Bridge orchestrator library
//!
//! Moves USDC between EVM networks, either as a same-chain transfer or as a
//! burn / attestation / mint bridge, optionally turning each step into a
//! gas-sponsored operation.

pub mod abi;
pub mod adapter;
pub mod chains;
pub mod classifier;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod policy;
pub mod progress;
pub mod provider;
pub mod service;
pub mod transport;

// Re-export public types for convenience
pub use adapter::{AdapterResult, AdapterState, AdapterStep, BridgeAdapter, BridgeParams, CctpAdapter};
pub use chains::{ChainDescriptor, ChainRegistry, ChainRole, StaticChainRegistry};
pub use classifier::{StepKind, TransactionClassifier, TransactionIntent};
pub use config::BridgeConfig;
pub use crypto::{AuthorizationSigner, LocalKeySigner};
pub use errors::{AdapterError, ProviderError, SponsorshipError, TransferError, ValidationError};
pub use policy::{SponsorshipDecision, SponsorshipPolicy};
pub use progress::{ChannelObserver, ProgressEvent, ProgressObserver, StepName, StepStatus};
pub use provider::ProviderChain;
pub use service::{BridgeOrchestrator, BridgeOutcome, OutcomeState, TransferRequest};
pub use transport::{RpcRequest, RpcWalletTransport, Transport};
