//! Byte-limit parsing
//!
//! Limits are written the way the asset conventions publish them: a number
//! with an optional decimal multiplier suffix (`700k`, `2M`). An empty string
//! means the convention imposes no limit.

use crate::core::error::{Result, RtimgError};

/// Sentinel for "no byte limit"
pub const NO_LIMIT: i64 = -1;

pub const KB: i64 = 1000;
pub const MB: i64 = KB * 1000;
pub const GB: i64 = MB * 1000;

/// Parse a byte-limit string with optional k/K/M/G suffix
///
/// # Examples
///
/// ```
/// use rtimg::core::limits::{parse_size_limit, NO_LIMIT};
///
/// assert_eq!(parse_size_limit("700k").unwrap(), 700_000);
/// assert_eq!(parse_size_limit("1M").unwrap(), 1_000_000);
/// assert_eq!(parse_size_limit("").unwrap(), NO_LIMIT);
/// ```
pub fn parse_size_limit(value: &str) -> Result<i64> {
    if value.is_empty() {
        return Ok(NO_LIMIT);
    }

    let invalid = || RtimgError::InvalidLimit {
        value: value.to_string(),
    };

    // Suffix letters are ASCII, so slicing off one byte is safe
    let (number_part, multiplier) = match value.as_bytes()[value.len() - 1] {
        b'k' | b'K' => (&value[..value.len() - 1], KB),
        b'M' => (&value[..value.len() - 1], MB),
        b'G' => (&value[..value.len() - 1], GB),
        _ => (value, 1),
    };

    let number: i64 = number_part.parse().map_err(|_| invalid())?;
    number.checked_mul(multiplier).ok_or_else(invalid)
}

/// Render a byte count the way progress lines show it (whole kilobytes)
pub fn format_kb(bytes: u64) -> String {
    format!("{}KB", bytes / KB as u64)
}
