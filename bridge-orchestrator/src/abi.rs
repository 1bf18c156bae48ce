//! ABI Encoding Helpers
//!
//! Minimal Solidity ABI encoding for the handful of calls the orchestrator builds:
//! ERC-20 `transfer` / `approve` and the CCTP `depositForBurn` / `receiveMessage`
//! entry points, plus decimal amount parsing into token base units.

use anyhow::{Context, Result};
use chain_clients_common::{decode_hex, is_valid_evm_address};
use chain_clients_evm::function_selector;
use ethereum_types::U256;

/// ERC-20 `transfer(address,uint256)`
pub const SIG_TRANSFER: &str = "transfer(address,uint256)";
/// ERC-20 `transferFrom(address,address,uint256)`
pub const SIG_TRANSFER_FROM: &str = "transferFrom(address,address,uint256)";
/// ERC-20 `balanceOf(address)`
pub const SIG_BALANCE_OF: &str = "balanceOf(address)";
/// ERC-20 `allowance(address,address)`
pub const SIG_ALLOWANCE: &str = "allowance(address,address)";
/// ERC-20 `approve(address,uint256)`
pub const SIG_APPROVE: &str = "approve(address,uint256)";
/// OpenZeppelin `increaseAllowance(address,uint256)`
pub const SIG_INCREASE_ALLOWANCE: &str = "increaseAllowance(address,uint256)";
/// CCTP v1 TokenMessenger burn
pub const SIG_DEPOSIT_FOR_BURN: &str = "depositForBurn(uint256,uint32,bytes32,address)";
/// CCTP v2 TokenMessenger burn
pub const SIG_DEPOSIT_FOR_BURN_V2: &str =
    "depositForBurn(uint256,uint32,bytes32,address,bytes32,uint256,uint32)";
/// CCTP MessageTransmitter mint
pub const SIG_RECEIVE_MESSAGE: &str = "receiveMessage(bytes,bytes)";
/// CCTP MessageTransmitter event carrying the cross-chain message
pub const EVENT_MESSAGE_SENT: &str = "MessageSent(bytes)";

// ============================================================================
// WORD ENCODING
// ============================================================================

/// Left-pads a 20-byte address into a 32-byte word.
///
/// The same encoding is used for the CCTP `bytes32 mintRecipient` argument.
pub fn address_word(address: &str) -> Result<[u8; 32]> {
    if !is_valid_evm_address(address) {
        anyhow::bail!("Invalid EVM address: {}", address);
    }
    let bytes = decode_hex(address).context("Invalid hex address")?;
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(&bytes);
    Ok(word)
}

/// Big-endian uint256 word.
pub fn u256_word(value: U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}

/// Big-endian uint32 word (also used for small uint lengths and offsets).
pub fn u64_word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Concatenates a selector and static argument words.
pub fn encode_call(signature: &str, words: &[[u8; 32]]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32 * words.len());
    data.extend_from_slice(&function_selector(signature));
    for word in words {
        data.extend_from_slice(word);
    }
    data
}

/// Encodes a call whose arguments are all dynamic `bytes`.
///
/// Layout: head of offsets, then each argument as `length || data` right-padded to 32 bytes.
pub fn encode_bytes_call(signature: &str, args: &[&[u8]]) -> Vec<u8> {
    let mut head = Vec::new();
    let mut tail = Vec::new();
    let head_len = 32 * args.len() as u64;

    for arg in args {
        head.extend_from_slice(&u64_word(head_len + tail.len() as u64));
        tail.extend_from_slice(&u64_word(arg.len() as u64));
        tail.extend_from_slice(arg);
        let padding = (32 - arg.len() % 32) % 32;
        tail.extend(std::iter::repeat(0u8).take(padding));
    }

    let mut data = function_selector(signature).to_vec();
    data.extend(head);
    data.extend(tail);
    data
}

/// Decodes ABI-encoded data holding a single dynamic `bytes` value.
///
/// This is the layout of the non-indexed data of `MessageSent(bytes)`.
pub fn decode_single_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let offset = read_usize_word(data, 0).context("Missing bytes offset")?;
    let length = read_usize_word(data, offset).context("Missing bytes length")?;
    let start = offset + 32;
    let end = start
        .checked_add(length)
        .ok_or_else(|| anyhow::anyhow!("Bytes length overflow"))?;
    if end > data.len() {
        anyhow::bail!(
            "Bytes value out of range: need {} bytes, have {}",
            end,
            data.len()
        );
    }
    Ok(data[start..end].to_vec())
}

/// Decodes the first return word as uint256.
pub fn decode_u256(output: &[u8]) -> Result<U256> {
    let word = output
        .get(..32)
        .ok_or_else(|| anyhow::anyhow!("Return data too short: {} bytes", output.len()))?;
    Ok(U256::from_big_endian(word))
}

fn read_usize_word(data: &[u8], at: usize) -> Result<usize> {
    let word = at
        .checked_add(32)
        .and_then(|end| data.get(at..end))
        .ok_or_else(|| anyhow::anyhow!("Data too short at offset {}", at))?;
    if word[..24].iter().any(|b| *b != 0) {
        anyhow::bail!("Word at offset {} exceeds usize", at);
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&word[24..]);
    usize::try_from(u64::from_be_bytes(low)).context("Word exceeds usize")
}

// ============================================================================
// CALL DATA BUILDERS
// ============================================================================

/// `transfer(recipient, amount)`
pub fn erc20_transfer_calldata(recipient: &str, amount: U256) -> Result<Vec<u8>> {
    Ok(encode_call(SIG_TRANSFER, &[address_word(recipient)?, u256_word(amount)]))
}

/// `balanceOf(owner)`
pub fn erc20_balance_of_calldata(owner: &str) -> Result<Vec<u8>> {
    Ok(encode_call(SIG_BALANCE_OF, &[address_word(owner)?]))
}

/// `allowance(owner, spender)`
pub fn erc20_allowance_calldata(owner: &str, spender: &str) -> Result<Vec<u8>> {
    Ok(encode_call(SIG_ALLOWANCE, &[address_word(owner)?, address_word(spender)?]))
}

/// `approve(spender, amount)`
pub fn erc20_approve_calldata(spender: &str, amount: U256) -> Result<Vec<u8>> {
    Ok(encode_call(SIG_APPROVE, &[address_word(spender)?, u256_word(amount)]))
}

/// CCTP v1 `depositForBurn(amount, destinationDomain, mintRecipient, burnToken)`
pub fn deposit_for_burn_calldata(
    amount: U256,
    destination_domain: u32,
    mint_recipient: &str,
    burn_token: &str,
) -> Result<Vec<u8>> {
    Ok(encode_call(
        SIG_DEPOSIT_FOR_BURN,
        &[
            u256_word(amount),
            u64_word(destination_domain as u64),
            address_word(mint_recipient)?,
            address_word(burn_token)?,
        ],
    ))
}

/// CCTP `receiveMessage(message, attestation)`
pub fn receive_message_calldata(message: &[u8], attestation: &[u8]) -> Vec<u8> {
    encode_bytes_call(SIG_RECEIVE_MESSAGE, &[message, attestation])
}

// ============================================================================
// AMOUNTS
// ============================================================================

/// Splits a plain decimal string into integer and fraction digits.
///
/// Accepts `"12"`, `"12.5"`, `".5"` and `"12."`; rejects signs, exponents and separators.
fn split_decimal(amount: &str) -> Option<(&str, &str)> {
    let amount = amount.trim();
    let (int_part, frac_part) = match amount.split_once('.') {
        Some((i, f)) => (i, f),
        None => (amount, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return None;
    }
    Some((int_part, frac_part))
}

/// Whether `amount` is a decimal number strictly greater than zero.
pub fn is_positive_decimal(amount: &str) -> bool {
    match split_decimal(amount) {
        Some((int_part, frac_part)) => {
            int_part.chars().chain(frac_part.chars()).any(|c| c != '0')
        }
        None => false,
    }
}

/// Converts a decimal amount into base units for a token with `decimals` decimals.
///
/// Fails when the amount is malformed, has more fraction digits than the token
/// supports, or overflows uint256.
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256> {
    let (int_part, frac_part) = split_decimal(amount)
        .ok_or_else(|| anyhow::anyhow!("'{}' is not a valid decimal amount", amount))?;
    if frac_part.len() > decimals as usize {
        anyhow::bail!(
            "'{}' has more than {} fractional digits",
            amount,
            decimals
        );
    }
    let digits = format!(
        "{}{}{}",
        int_part,
        frac_part,
        "0".repeat(decimals as usize - frac_part.len())
    );
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_dec_str(digits).map_err(|e| anyhow::anyhow!("Amount '{}' out of range: {:?}", amount, e))
}

/// Formats base units as a decimal string without trailing fraction zeros.
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }
    let padded = format!("{:0>width$}", digits, width = decimals + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac_part)
    }
}
