//! Shared utilities for EVM chain clients
//!
//! Hex normalization and address / hash format checks shared by the EVM JSON-RPC
//! client and the bridge orchestrator. All helpers are pure and never panic.

/// Length of an EVM address in bytes
pub const EVM_ADDRESS_LEN: usize = 20;

/// Length of a transaction / operation hash in bytes
pub const HASH_LEN: usize = 32;

/// Strips a leading `0x` / `0X` if present.
pub fn strip_0x(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Returns the value with exactly one `0x` prefix.
pub fn ensure_0x(value: &str) -> String {
    format!("0x{}", strip_0x(value))
}

/// Decodes a hex string with or without `0x` prefix.
pub fn decode_hex(value: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(strip_0x(value))
}

/// Checks that `value` is `0x` followed by exactly `byte_len * 2` hex characters.
pub fn is_prefixed_hex_of_len(value: &str, byte_len: usize) -> bool {
    let Some(body) = value.strip_prefix("0x") else {
        return false;
    };
    body.len() == byte_len * 2 && body.chars().all(|c| c.is_ascii_hexdigit())
}

/// Checks EVM address syntax (`0x` + 40 hex chars, any case).
///
/// Checksum casing is not verified.
pub fn is_valid_evm_address(addr: &str) -> bool {
    is_prefixed_hex_of_len(addr, EVM_ADDRESS_LEN)
}

/// Checks for a well-formed 32-byte hash (`0x` + 64 hex chars).
pub fn is_tx_hash(value: &str) -> bool {
    is_prefixed_hex_of_len(value, HASH_LEN)
}

/// Lowercases an address and normalizes its prefix.
pub fn normalize_evm_address(addr: &str) -> String {
    ensure_0x(addr).to_ascii_lowercase()
}

/// Case-insensitive address comparison.
pub fn addresses_equal(a: &str, b: &str) -> bool {
    normalize_evm_address(a) == normalize_evm_address(b)
}

/// Parses a JSON-RPC quantity (`"0x1a"`) into a u64.
pub fn parse_hex_u64(value: &str) -> Result<u64, std::num::ParseIntError> {
    let body = strip_0x(value);
    if body.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(body, 16)
}

/// Formats a u64 as a JSON-RPC quantity (no leading zeros).
pub fn to_hex_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}
