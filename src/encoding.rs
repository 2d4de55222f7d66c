//! Big-integer ↔ fixed-width lexicographic text encoding.
//!
//! Every bigint-valued column is stored as `TEXT` rather than a native numeric
//! type so that lexicographic (string) order matches numeric order, which is
//! what the event iterator's cursor comparison relies on (see
//! [`crate::types::event`]). [`ENCODED_WIDTH`] is wide enough to hold any
//! 256-bit unsigned integer with room to spare.

use alloy::primitives::U256;

use crate::error::{Result, StoreError};

/// Fixed width, in decimal digits, of every encoded-text column. 2^256 - 1 has
/// 78 decimal digits; 79 leaves one digit of headroom.
pub const ENCODED_WIDTH: usize = 79;

/// Encode a non-negative big integer as a zero-padded decimal string of width
/// [`ENCODED_WIDTH`]. Lexicographic order of the result equals numeric order.
///
/// # Errors
/// Returns [`StoreError::EncodeOverflow`] if `value` needs more than
/// `ENCODED_WIDTH` decimal digits to represent (never happens for `U256`,
/// since `U256::MAX` needs only 78 digits; kept fallible for interface
/// symmetry with [`decode_to_big_int`] and in case `ENCODED_WIDTH` is ever
/// narrowed).
pub fn encode_as_text(value: U256) -> Result<String> {
    let digits = value.to_string();
    if digits.len() > ENCODED_WIDTH {
        return Err(StoreError::EncodeOverflow {
            width: ENCODED_WIDTH,
            digits: digits.len(),
        });
    }
    Ok(format!("{digits:0>ENCODED_WIDTH$}"))
}

/// Encode a `u64` using the same fixed-width scheme as [`encode_as_text`].
pub fn encode_u64_as_text(value: u64) -> String {
    #[allow(clippy::unwrap_used)]
    encode_as_text(U256::from(value)).unwrap()
}

/// Decode a fixed-width encoded-text column back into a big integer.
///
/// # Errors
/// Returns [`StoreError::EncodeOverflow`] if the decoded digits do not fit in
/// a `U256` (a column holding a wider value than this crate ever wrote,
/// indicating corruption or a future format change).
pub fn decode_to_big_int(text: &str) -> Result<U256> {
    let trimmed = text.trim_start_matches('0');
    let trimmed = if trimmed.is_empty() { "0" } else { trimmed };
    U256::from_str_radix(trimmed, 10).map_err(|_| StoreError::EncodeOverflow {
        width: ENCODED_WIDTH,
        digits: trimmed.len(),
    })
}

/// Decode a fixed-width encoded-text column into a `u64`.
///
/// # Errors
/// Returns [`StoreError::EncodeOverflow`] if the decoded value does not fit
/// in a `u64`.
pub fn decode_to_u64(text: &str) -> Result<u64> {
    let big = decode_to_big_int(text)?;
    u64::try_from(big).map_err(|_| StoreError::EncodeOverflow {
        width: ENCODED_WIDTH,
        digits: text.trim_start_matches('0').len(),
    })
}
