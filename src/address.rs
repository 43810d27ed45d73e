//! Hex address helpers.

/// `0x` followed by one or more hex digits.
///
/// This is the only address form accepted for an organization; names such
/// as `mydao.eth` are rejected.
pub fn is_hex_address(value: &str) -> bool {
    value
        .strip_prefix("0x")
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Abbreviated form for log lines: `0x1234…abcd`.
pub fn short_address(address: &str) -> String {
    if address.len() <= 12 || !address.is_char_boundary(6) {
        return address.to_string();
    }
    let tail_start = address.len() - 4;
    if !address.is_char_boundary(tail_start) {
        return address.to_string();
    }
    format!("{}…{}", &address[..6], &address[tail_start..])
}

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

pub(crate) fn decode_hex(value: &str) -> Option<Vec<u8>> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    if digits.len() % 2 != 0 {
        return None;
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok())
        .collect()
}
