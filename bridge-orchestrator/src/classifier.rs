//! Transaction Classifier
//!
//! Maps raw call data to the bridge step it performs, by the leading 4-byte selector.
//! Classification is pure: it never fails and has no side effects, so it is safe to
//! call speculatively.

use chain_clients_common::decode_hex;
use chain_clients_evm::function_selector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::abi::{
    SIG_APPROVE, SIG_DEPOSIT_FOR_BURN, SIG_DEPOSIT_FOR_BURN_V2, SIG_INCREASE_ALLOWANCE,
    SIG_RECEIVE_MESSAGE, SIG_TRANSFER, SIG_TRANSFER_FROM,
};
use crate::config::ClassifierConfig;
use crate::progress::StepName;

/// What an outgoing transaction does, derived from its call data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepKind {
    Approval,
    Burn,
    Mint,
    Transfer,
    Unknown,
}

impl StepKind {
    /// Step slot this kind reports progress on; None for Unknown.
    pub fn step_name(&self) -> Option<StepName> {
        match self {
            StepKind::Approval => Some(StepName::Approval),
            StepKind::Burn => Some(StepName::Burn),
            StepKind::Mint => Some(StepName::Mint),
            StepKind::Transfer => Some(StepName::Transfer),
            StepKind::Unknown => None,
        }
    }
}

/// A classified outgoing transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionIntent {
    /// Chain the transaction is sent on
    pub chain_id: u64,
    pub to: String,
    pub data: Vec<u8>,
    /// Native value as sent by the caller (hex quantity), if any
    pub value: Option<String>,
    pub kind: StepKind,
    /// Transaction object exactly as received
    pub tx: serde_json::Value,
}

/// Selector registry plus the optional length-based Mint fallback.
#[derive(Debug, Clone)]
pub struct TransactionClassifier {
    registry: HashMap<[u8; 4], StepKind>,
    mint_length_fallback: bool,
    mint_length_threshold: usize,
}

impl TransactionClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        let entries = [
            (SIG_APPROVE, StepKind::Approval),
            (SIG_INCREASE_ALLOWANCE, StepKind::Approval),
            (SIG_DEPOSIT_FOR_BURN, StepKind::Burn),
            (SIG_DEPOSIT_FOR_BURN_V2, StepKind::Burn),
            (SIG_RECEIVE_MESSAGE, StepKind::Mint),
            (SIG_TRANSFER, StepKind::Transfer),
            (SIG_TRANSFER_FROM, StepKind::Transfer),
        ];
        Self {
            registry: entries
                .iter()
                .map(|(sig, kind)| (function_selector(sig), *kind))
                .collect(),
            mint_length_fallback: config.mint_length_fallback,
            mint_length_threshold: config.mint_length_threshold,
        }
    }

    /// Classifies raw call data.
    pub fn classify(&self, data: &[u8]) -> StepKind {
        if data.len() < 4 {
            return StepKind::Unknown;
        }
        let selector = [data[0], data[1], data[2], data[3]];
        if let Some(kind) = self.registry.get(&selector) {
            return *kind;
        }
        if self.mint_length_fallback && data.len() > self.mint_length_threshold {
            return StepKind::Mint;
        }
        StepKind::Unknown
    }

    /// Classifies hex call data; undecodable input is Unknown.
    pub fn classify_hex(&self, data: &str) -> StepKind {
        match decode_hex(data) {
            Ok(bytes) => self.classify(&bytes),
            Err(_) => StepKind::Unknown,
        }
    }
}

impl Default for TransactionClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}
