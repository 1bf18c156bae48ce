//! Chain Registry Module
//!
//! This module describes the EVM networks the orchestrator can move funds between.
//! Descriptors are built once from configuration and never mutated afterwards.

pub mod registry;

// Re-export for convenience
pub use registry::{ChainDescriptor, ChainRegistry, ChainRole, StaticChainRegistry};
