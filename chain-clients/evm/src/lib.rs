//! EVM JSON-RPC client library
//!
//! Provides an async client for EVM-compatible nodes (chain reads, ERC-20 views,
//! receipts) that is also used against ERC-4337 bundler endpoints, plus the
//! keccak-based selector and topic helpers the callers need to build call data.

pub mod client;

pub use client::{EvmClient, EvmLog, EvmReceipt, RpcError};

use sha3::{Digest, Keccak256};

/// keccak256 of arbitrary bytes
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// 4-byte function selector: keccak256(signature)[0..4]
///
/// `signature` is the canonical form, e.g. `"approve(address,uint256)"`.
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Event topic0 as 0x-prefixed hex: keccak256(signature)
///
/// Indexed parameters don't affect the signature, only the types matter.
pub fn event_topic(signature: &str) -> String {
    format!("0x{}", hex::encode(keccak256(signature.as_bytes())))
}
