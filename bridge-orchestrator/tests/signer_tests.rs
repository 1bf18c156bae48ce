//! Unit tests for delegation authorization signing

use bridge_orchestrator::crypto::{
    authorization_digest, AuthorizationRequest, AuthorizationSigner, LocalKeySigner,
};
use chain_clients_common::addresses_equal;
use chain_clients_evm::keccak256;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

#[path = "helpers.rs"]
mod test_helpers;
use test_helpers::{DUMMY_DELEGATION_ADDR, DUMMY_PRIVATE_KEY, DUMMY_PRIVATE_KEY_ADDR};

fn default_request(nonce: u64) -> AuthorizationRequest {
    AuthorizationRequest {
        chain_id: 1,
        address: DUMMY_DELEGATION_ADDR.to_string(),
        nonce,
    }
}

/// Recover the Ethereum address that produced a signature over `digest`
fn recover_address(digest: &[u8; 32], r: &[u8; 32], s: &[u8; 32], y_parity: u8) -> String {
    let signature = Signature::from_slice(&[&r[..], &s[..]].concat()).unwrap();
    let recovery_id = RecoveryId::from_byte(y_parity).unwrap();
    let key = VerifyingKey::recover_from_prehash(digest, &signature, recovery_id).unwrap();
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

// ============================================================================
// DIGEST
// ============================================================================

/// What is tested: digest = keccak256(0x05 || rlp([chain_id, address, nonce]))
/// Why: Bundlers reject authorizations over any other preimage
#[test]
fn test_authorization_digest_preimage() {
    let digest = authorization_digest(&default_request(0)).unwrap();

    let mut preimage = vec![0x05, 0xd7, 0x01, 0x94];
    preimage.extend(hex::decode(&DUMMY_DELEGATION_ADDR[2..]).unwrap());
    preimage.push(0x80);
    assert_eq!(digest, keccak256(&preimage));
}

/// What is tested: the nonce is bound into the digest
/// Why: A stale nonce must yield a different (invalid) authorization
#[test]
fn test_authorization_digest_depends_on_nonce() {
    let a = authorization_digest(&default_request(7)).unwrap();
    let b = authorization_digest(&default_request(8)).unwrap();
    assert_ne!(a, b);
}

/// What is tested: malformed delegation addresses are rejected
/// Why: Signing over garbage would produce an unusable authorization
#[test]
fn test_authorization_digest_invalid_address() {
    let mut request = default_request(0);
    request.address = "0x1234".to_string();
    assert!(authorization_digest(&request).is_err());
}

// ============================================================================
// SIGNER
// ============================================================================

/// What is tested: the signer derives the Ethereum address of its key
/// Why: The address is the sender of every sponsored operation
#[test]
fn test_local_signer_address() {
    let signer = LocalKeySigner::from_hex(DUMMY_PRIVATE_KEY).unwrap();
    assert!(addresses_equal(&signer.address(), DUMMY_PRIVATE_KEY_ADDR));
}

/// What is tested: signatures recover to the signer's address
/// Why: The delegation is only valid if signed by the account owner
#[tokio::test]
async fn test_signature_recovers_to_signer() {
    let signer = LocalKeySigner::from_hex(DUMMY_PRIVATE_KEY).unwrap();
    let request = default_request(3);
    let signed = signer.sign_authorization(&request).await.unwrap();

    assert_eq!(signed.chain_id, 1);
    assert_eq!(signed.nonce, 3);
    assert!(signed.y_parity <= 1);

    let digest = authorization_digest(&request).unwrap();
    let recovered = recover_address(&digest, &signed.r, &signed.s, signed.y_parity);
    assert!(addresses_equal(&recovered, DUMMY_PRIVATE_KEY_ADDR));
}

/// What is tested: the RPC JSON uses hex quantities
/// Why: Bundlers parse chainId, nonce and yParity as quantities
#[tokio::test]
async fn test_signed_authorization_rpc_json() {
    let signer = LocalKeySigner::from_hex(DUMMY_PRIVATE_KEY).unwrap();
    let signed = signer.sign_authorization(&default_request(16)).await.unwrap();
    let json = signed.to_rpc_json();
    assert_eq!(json["chainId"], "0x1");
    assert_eq!(json["nonce"], "0x10");
    assert_eq!(json["address"], DUMMY_DELEGATION_ADDR);
    assert_eq!(json["r"].as_str().unwrap().len(), 66);
}

/// What is tested: malformed keys and missing env vars are rejected
/// Why: Key problems must surface before any sponsored submission
#[test]
fn test_local_signer_rejects_bad_keys() {
    assert!(LocalKeySigner::from_hex("0x1234").is_err());
    assert!(LocalKeySigner::from_hex("zz").is_err());
    // Zero is not a valid secp256k1 scalar
    assert!(LocalKeySigner::from_hex(&format!("0x{}", "00".repeat(32))).is_err());
    assert!(LocalKeySigner::from_env("BRIDGE_TEST_UNSET_PRIVATE_KEY_VAR").is_err());
}

/// What is tested: Debug output never contains the key
/// Why: Keys must never end up in logs
#[test]
fn test_local_signer_debug_hides_key() {
    let signer = LocalKeySigner::from_hex(DUMMY_PRIVATE_KEY).unwrap();
    let debug = format!("{:?}", signer);
    assert!(debug.contains("LocalKeySigner"));
    assert!(!debug.contains(&"0".repeat(63)));
}
