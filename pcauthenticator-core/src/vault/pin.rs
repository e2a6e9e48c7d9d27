//! The user's 6-digit PIN.

use std::str::FromStr;

use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Required number of digits in a PIN.
pub const PIN_LENGTH: usize = 6;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinError {
    #[error("PIN must be 6 digits")]
    InvalidLength(usize),

    #[error("PIN must contain only digits")]
    NonDigit,
}

/// A validated PIN: exactly six ASCII decimal digits.
///
/// The value is wiped from memory on drop and equality is constant-time.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Pin {
    value: String,
}

impl Pin {
    pub fn parse(input: &str) -> Result<Self, PinError> {
        if !input.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PinError::NonDigit);
        }
        if input.len() != PIN_LENGTH {
            return Err(PinError::InvalidLength(input.len()));
        }
        Ok(Self {
            value: input.to_string(),
        })
    }

    /// Parse raw bytes, e.g. an unsealed vault payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PinError> {
        let text = std::str::from_utf8(bytes).map_err(|_| PinError::NonDigit)?;
        Self::parse(text)
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.value.as_bytes()
    }

    /// Constant-time comparison against unvalidated user input.
    pub fn matches(&self, candidate: &str) -> bool {
        self.value.as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

impl FromStr for Pin {
    type Err = PinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq for Pin {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other.as_str())
    }
}

impl Eq for Pin {}

impl std::fmt::Debug for Pin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Pin([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_six_digits() {
        let pin = Pin::parse("012345").unwrap();
        assert_eq!(pin.as_str(), "012345");
        assert_eq!(pin.as_bytes(), b"012345");
    }

    #[test]
    fn test_rejects_wrong_length() {
        assert_eq!(Pin::parse("12345"), Err(PinError::InvalidLength(5)));
        assert_eq!(Pin::parse("1234567"), Err(PinError::InvalidLength(7)));
        assert_eq!(Pin::parse(""), Err(PinError::InvalidLength(0)));
    }

    #[test]
    fn test_rejects_non_digits() {
        assert_eq!(Pin::parse("12a456"), Err(PinError::NonDigit));
        assert_eq!(Pin::parse("12 456"), Err(PinError::NonDigit));
        // Non-ASCII digits are not accepted
        assert_eq!(Pin::parse("١٢٣٤٥٦"), Err(PinError::NonDigit));
    }

    #[test]
    fn test_from_bytes_rejects_invalid_utf8() {
        assert_eq!(Pin::from_bytes(&[0xff; 6]), Err(PinError::NonDigit));
        assert_eq!(Pin::from_bytes(b"999999").unwrap().as_str(), "999999");
    }

    #[test]
    fn test_matches() {
        let pin: Pin = "123456".parse().unwrap();
        assert!(pin.matches("123456"));
        assert!(!pin.matches("123457"));
        assert!(!pin.matches("12345"));
        assert_eq!(pin, Pin::parse("123456").unwrap());
    }

    #[test]
    fn test_debug_is_redacted() {
        let pin = Pin::parse("123456").unwrap();
        assert!(!format!("{:?}", pin).contains("123456"));
    }
}
