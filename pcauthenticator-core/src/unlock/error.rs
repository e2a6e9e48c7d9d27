//! Errors raised by the unlock flow.
//!
//! None of these are fatal: each one leaves the flow in a well-defined state
//! and is shown to the user as a transient notice.

use thiserror::Error;

use super::state::{Notice, UnlockStatus};
use crate::vault::{PinError, VaultError};

#[derive(Error, Debug)]
pub enum UnlockError {
    /// Malformed PIN input. The user is asked again.
    #[error("{0}")]
    Validation(#[from] PinError),

    /// The confirmation did not match the first entry.
    #[error("PINs do not match")]
    Mismatch,

    /// Manual entry did not match the stored PIN.
    #[error("Wrong PIN")]
    WrongPin,

    #[error("Biometric failed")]
    BiometricFailed,

    #[error("Biometric cancelled")]
    BiometricCancelled,

    /// Sealing or persisting the confirmed PIN failed.
    #[error("Could not save PIN: {0}")]
    Store(#[from] VaultError),

    /// The event has no meaning in the current state.
    #[error("{event} is not accepted while {status}")]
    InvalidEvent {
        event: &'static str,
        status: UnlockStatus,
    },
}

impl UnlockError {
    pub fn code(&self) -> &'static str {
        match self {
            UnlockError::Validation(_) => "VALIDATION_ERROR",
            UnlockError::Mismatch => "MISMATCH",
            UnlockError::WrongPin => "WRONG_PIN",
            UnlockError::BiometricFailed => "BIOMETRIC_FAILED",
            UnlockError::BiometricCancelled => "BIOMETRIC_CANCELLED",
            UnlockError::Store(_) => "STORE_FAILED",
            UnlockError::InvalidEvent { .. } => "INVALID_EVENT",
        }
    }

    pub fn notice(&self) -> Notice {
        Notice {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

impl serde::Serialize for UnlockError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.notice().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message() {
        let err: UnlockError = PinError::InvalidLength(4).into();
        assert_eq!(err.to_string(), "PIN must be 6 digits");
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_unlock_error_serialization() {
        let json = serde_json::to_string(&UnlockError::WrongPin).unwrap();
        assert!(json.contains("WRONG_PIN"));
        assert!(json.contains("Wrong PIN"));
    }
}
