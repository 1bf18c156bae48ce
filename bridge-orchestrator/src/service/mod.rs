//! Orchestration services
//!
//! The transfer orchestrator and the balance reader that backs the CLI.

pub mod balances;
pub mod orchestrator;

pub use balances::{fetch_balances, ChainBalance};
pub use orchestrator::{
    map_adapter_step, BridgeOrchestrator, BridgeOutcome, OutcomeState, TransferRequest,
};
