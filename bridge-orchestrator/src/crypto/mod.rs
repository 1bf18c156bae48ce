//! Cryptographic operations for sponsored execution
//!
//! This module provides the delegation authorization digest and the signer that
//! produces the user's one-time authorization for a sponsored operation.

pub mod authorization;
pub mod rlp;

// Re-export for convenience
pub use authorization::{
    authorization_digest, ethereum_address, AuthorizationRequest, AuthorizationSigner,
    LocalKeySigner, SignedAuthorization,
};
