//! Delegation authorization signing
//!
//! A sponsored operation runs the user's call through a delegation contract. The user
//! authorizes that delegation once per operation by signing
//! `keccak256(0x05 || rlp([chain_id, delegation_contract, nonce]))` (EIP-7702).
//!
//! **Keys**: private keys are read from the environment at startup and never logged
//! or persisted.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chain_clients_common::{decode_hex, is_valid_evm_address, to_hex_quantity};
use chain_clients_evm::keccak256;
use k256::ecdsa::SigningKey;
use serde_json::json;

use super::rlp;

/// EIP-7702 authorization magic prefix
const AUTHORIZATION_MAGIC: u8 = 0x05;

/// What the user is asked to authorize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub chain_id: u64,
    /// Delegation contract the account delegates to
    pub address: String,
    /// Account nonce at the time of signing
    pub nonce: u64,
}

/// A signed delegation authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAuthorization {
    pub chain_id: u64,
    pub address: String,
    pub nonce: u64,
    /// Recovery id, 0 or 1
    pub y_parity: u8,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl SignedAuthorization {
    /// JSON-RPC representation (hex quantities, as bundlers expect).
    pub fn to_rpc_json(&self) -> serde_json::Value {
        json!({
            "chainId": to_hex_quantity(self.chain_id),
            "address": self.address,
            "nonce": to_hex_quantity(self.nonce),
            "yParity": to_hex_quantity(self.y_parity as u64),
            "r": format!("0x{}", hex::encode(self.r)),
            "s": format!("0x{}", hex::encode(self.s)),
        })
    }
}

/// Digest signed for a delegation authorization.
pub fn authorization_digest(request: &AuthorizationRequest) -> Result<[u8; 32]> {
    if !is_valid_evm_address(&request.address) {
        anyhow::bail!("Invalid delegation contract address: {}", request.address);
    }
    let address = decode_hex(&request.address).context("Invalid delegation contract address")?;
    let encoded = rlp::encode_list(&[
        rlp::encode_u64(request.chain_id),
        address,
        rlp::encode_u64(request.nonce),
    ]);
    let mut preimage = Vec::with_capacity(1 + encoded.len());
    preimage.push(AUTHORIZATION_MAGIC);
    preimage.extend(encoded);
    Ok(keccak256(&preimage))
}

/// Derives the Ethereum address of a secp256k1 key.
///
/// keccak256(uncompressed_public_key without the 0x04 prefix)[12..32]
pub fn ethereum_address(signing_key: &SigningKey) -> Result<String> {
    let public_key_point = signing_key.verifying_key().to_encoded_point(false);
    let public_key_bytes = public_key_point.as_bytes();
    if public_key_bytes.len() != 65 || public_key_bytes[0] != 0x04 {
        anyhow::bail!("Invalid public key format: expected 65 bytes with 0x04 prefix");
    }
    let hash = keccak256(&public_key_bytes[1..]);
    Ok(format!("0x{}", hex::encode(&hash[12..])))
}

/// Produces delegation authorizations on behalf of the account owner.
#[async_trait]
pub trait AuthorizationSigner: Send + Sync {
    /// Owner address of the delegated account
    fn address(&self) -> String;

    async fn sign_authorization(&self, request: &AuthorizationRequest) -> Result<SignedAuthorization>;
}

/// Signs with a secp256k1 key held in memory.
pub struct LocalKeySigner {
    signing_key: SigningKey,
    address: String,
}

impl LocalKeySigner {
    /// Creates a signer from a hex-encoded 32-byte private key (with or without 0x).
    pub fn from_hex(private_key: &str) -> Result<Self> {
        let bytes = decode_hex(private_key.trim()).context("Private key is not valid hex")?;
        if bytes.len() != 32 {
            anyhow::bail!(
                "Invalid private key length: expected 32 bytes, got {}",
                bytes.len()
            );
        }
        let signing_key = SigningKey::from_slice(&bytes)
            .map_err(|e| anyhow::anyhow!("Failed to create ECDSA signing key: {}", e))?;
        let address = ethereum_address(&signing_key)?;
        Ok(Self {
            signing_key,
            address,
        })
    }

    /// Loads the private key from the environment variable `env_var`.
    pub fn from_env(env_var: &str) -> Result<Self> {
        let private_key = std::env::var(env_var).with_context(|| {
            format!("Environment variable '{}' with the user's private key is not set", env_var)
        })?;
        Self::from_hex(&private_key)
    }

    /// Signs a 32-byte digest, returning (r, s, recovery_id).
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<([u8; 32], [u8; 32], u8)> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|e| anyhow::anyhow!("Failed to sign digest: {}", e))?;
        let sig_bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&sig_bytes[..32]);
        s.copy_from_slice(&sig_bytes[32..64]);
        Ok((r, s, recovery_id.to_byte()))
    }
}

#[async_trait]
impl AuthorizationSigner for LocalKeySigner {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn sign_authorization(&self, request: &AuthorizationRequest) -> Result<SignedAuthorization> {
        let digest = authorization_digest(request)?;
        let (r, s, y_parity) = self.sign_digest(&digest)?;
        Ok(SignedAuthorization {
            chain_id: request.chain_id,
            address: request.address.clone(),
            nonce: request.nonce,
            y_parity,
            r,
            s,
        })
    }
}

impl std::fmt::Debug for LocalKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeySigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
