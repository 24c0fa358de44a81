//! Exact conversions between hex, decimal and minor-unit amount strings.
//!
//! Every function here is total: malformed input degrades to `"0"` / `"0x0"`
//! (or `None` for the helpers returning options) instead of failing. Callers
//! treat a zero amount as unusable and reject quotes or verifications built on it.
//!
//! Amounts are bounded by the 256-bit range of on-chain values; wider inputs
//! are malformed.

use ethers::types::U256;

/// Decimals of an EVM native asset (wei per coin = 10^18).
pub const NATIVE_DECIMALS: usize = 18;

/// Default number of fraction digits shown to humans.
pub const DISPLAY_FRACTION_DIGITS: usize = 8;

/// Parse big-endian unsigned hex (with or without `0x`) into an exact integer.
pub fn hex_to_u256(hex: &str) -> Option<U256> {
    let body = hex.trim();
    let body = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
        .unwrap_or(body);
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let significant = body.trim_start_matches('0');
    if significant.is_empty() {
        return Some(U256::zero());
    }
    U256::from_str_radix(significant, 16).ok()
}

/// Parse an unsigned base-10 digit string into an exact integer.
pub fn decimal_to_u256(decimal: &str) -> Option<U256> {
    let digits = decimal.trim();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    U256::from_dec_str(digits).ok()
}

/// Hex (with or without `0x`) to a base-10 string. Empty or invalid input gives `"0"`.
pub fn hex_to_decimal(hex: &str) -> String {
    hex_to_u256(hex)
        .map(|value| value.to_string())
        .unwrap_or_else(|| "0".to_string())
}

/// Base-10 string to `0x`-prefixed minimal hex. `"0"`, empty or invalid input gives `"0x0"`.
pub fn decimal_to_hex(decimal: &str) -> String {
    match decimal_to_u256(decimal) {
        Some(value) => format!("0x{:x}", value),
        None => "0x0".to_string(),
    }
}

/// Convert a human native-asset amount into its minor-unit integer string.
///
/// The float is only used to render a fixed number of fraction digits; the
/// integer itself is assembled from decimal digit strings so no binary
/// rounding happens at the 18-decimal scale.
pub fn float_amount_to_minor_units(amount: f64, decimals: usize) -> String {
    if !amount.is_finite() || amount < 0.0 {
        return "0".to_string();
    }

    let rendered = format!("{:.*}", decimals, amount);
    let (whole, fraction) = rendered.split_once('.').unwrap_or((rendered.as_str(), ""));

    let whole: String = whole.chars().filter(|c| c.is_ascii_digit()).collect();
    let mut fraction: String = fraction
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(decimals)
        .collect();
    while fraction.len() < decimals {
        fraction.push('0');
    }

    let joined = format!("{}{}", whole, fraction);
    let trimmed = joined.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Format a minor-unit integer string as a native-asset amount.
///
/// The fraction is capped at `max_fraction_digits` and then stripped of
/// trailing zeros; a whole amount has no decimal point.
pub fn minor_units_to_display(minor_units: &str, max_fraction_digits: usize) -> String {
    let digits = minor_units.trim();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return "0".to_string();
    }

    let significant = digits.trim_start_matches('0');
    let padded = format!("{:0>width$}", significant, width = NATIVE_DECIMALS + 1);
    let (whole, fraction) = padded.split_at(padded.len() - NATIVE_DECIMALS);

    let capped = &fraction[..max_fraction_digits.min(fraction.len())];
    let capped = capped.trim_end_matches('0');

    if capped.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, capped)
    }
}

/// Lower-case `0x`-prefixed hex, or `None` when the input is anything else.
pub fn sanitize_hex(value: &str) -> Option<String> {
    let lowered = value.trim().to_ascii_lowercase();
    let body = lowered.strip_prefix("0x")?;
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(lowered)
}

/// Canonical transaction hash: `0x` followed by exactly 32 bytes of lower-case hex.
pub fn normalize_tx_hash(value: &str) -> Option<String> {
    sanitize_fixed_hex(value, 32)
}

/// Canonical account address: `0x` followed by exactly 20 bytes of lower-case hex.
pub fn normalize_address(value: &str) -> Option<String> {
    sanitize_fixed_hex(value, 20)
}

fn sanitize_fixed_hex(value: &str, bytes: usize) -> Option<String> {
    let hex = sanitize_hex(value)?;
    let decoded = hex::decode(&hex[2..]).ok()?;
    (decoded.len() == bytes).then_some(hex)
}
