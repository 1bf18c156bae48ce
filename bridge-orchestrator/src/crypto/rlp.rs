//! Minimal RLP encoding
//!
//! Only byte strings and flat lists of byte strings are needed here.

/// Big-endian encoding of a u64 with leading zeros stripped (0 encodes as empty).
pub fn encode_u64(val: u64) -> Vec<u8> {
    if val == 0 {
        return vec![];
    }
    let bytes = val.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(8);
    bytes[start..].to_vec()
}

/// RLP-encode a single byte-string item.
pub fn encode_item(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        vec![data[0]]
    } else if data.len() <= 55 {
        let mut out = vec![0x80 + data.len() as u8];
        out.extend_from_slice(data);
        out
    } else {
        let len_bytes = encode_u64(data.len() as u64);
        let mut out = vec![0xb7 + len_bytes.len() as u8];
        out.extend_from_slice(&len_bytes);
        out.extend_from_slice(data);
        out
    }
}

/// RLP-encode a list of raw byte-string items (items are NOT pre-encoded).
pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload: Vec<u8> = items.iter().flat_map(|item| encode_item(item)).collect();
    let mut out = if payload.len() <= 55 {
        vec![0xc0 + payload.len() as u8]
    } else {
        let len_bytes = encode_u64(payload.len() as u64);
        let mut prefix = vec![0xf7 + len_bytes.len() as u8];
        prefix.extend_from_slice(&len_bytes);
        prefix
    };
    out.extend(payload);
    out
}
