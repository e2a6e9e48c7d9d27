//! Time-windowed one-time codes.
//!
//! HOTP dynamic truncation over HMAC-SHA1 with a 30-second counter. The HMAC
//! key is the raw PIN bytes rather than a base32 shared secret.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use thiserror::Error;

type HmacSha1 = Hmac<Sha1>;

/// Length of one code window in milliseconds.
pub const TIME_STEP_MS: i64 = 30_000;

pub const DEFAULT_DIGITS: u32 = 6;
pub const MIN_DIGITS: u32 = 1;
pub const MAX_DIGITS: u32 = 9;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeError {
    /// Digit count outside 1..=9. Indicates a caller bug.
    #[error("Invalid parameter: digits must be between 1 and 9, got {0}")]
    InvalidParameter(u32),

    /// A refresh cycle was asked to tick with a zero period.
    #[error("Invalid parameter: tick interval must be greater than zero")]
    ZeroInterval,
}

/// The 30-second window containing `time_millis`.
///
/// Uses floor division, so instants before the epoch fall into negative
/// windows whose two's-complement bits become the counter.
pub fn time_window(time_millis: i64) -> u64 {
    time_millis.div_euclid(TIME_STEP_MS) as u64
}

/// Milliseconds elapsed since the start of the window containing `time_millis`.
pub fn elapsed_in_window(time_millis: i64) -> i64 {
    time_millis.rem_euclid(TIME_STEP_MS)
}

/// Fraction of the current window still remaining, in `(0.0, 1.0]`.
pub fn remaining_fraction(time_millis: i64) -> f32 {
    1.0 - elapsed_in_window(time_millis) as f32 / TIME_STEP_MS as f32
}

/// Derive the code for `secret` at `time_millis`.
///
/// Pure: identical inputs always produce the identical code.
pub fn generate_code(secret: &[u8], time_millis: i64, digits: u32) -> Result<String, CodeError> {
    if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits) {
        return Err(CodeError::InvalidParameter(digits));
    }

    let counter = time_window(time_millis).to_be_bytes();

    // HMAC accepts keys of any length
    let mut mac = <HmacSha1 as Mac>::new_from_slice(secret)
        .map_err(|_| CodeError::InvalidParameter(digits))?;
    mac.update(&counter);
    let hash = mac.finalize().into_bytes();

    let offset = (hash[19] & 0x0f) as usize;
    let truncated = ((hash[offset] as u32 & 0x7f) << 24)
        | ((hash[offset + 1] as u32) << 16)
        | ((hash[offset + 2] as u32) << 8)
        | (hash[offset + 3] as u32);

    let code = truncated % 10u32.pow(digits);
    Ok(format!("{:0width$}", code, width = digits as usize))
}
