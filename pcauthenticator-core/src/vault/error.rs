//! Vault-specific error types.
//!
//! Only `store` and `clear` surface these. `load` downgrades every failure to
//! "no PIN configured" so the unlock flow falls back to onboarding.

use thiserror::Error;

use crate::keystore::KeyStoreError;

#[derive(Error, Debug)]
pub enum VaultError {
    /// The key store refused to seal or unseal the record.
    #[error("Key store error: {0}")]
    KeyStore(#[from] KeyStoreError),

    /// The persisted entries exist but cannot be decoded into a PIN.
    #[error("Vault data is corrupted: {0}")]
    Corrupted(String),

    /// The persisted record could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type alias for vault operations.
pub type VaultResult<T> = std::result::Result<T, VaultError>;

impl From<crate::error::PcAuthError> for VaultError {
    fn from(err: crate::error::PcAuthError) -> Self {
        VaultError::Storage(err.to_string())
    }
}

impl serde::Serialize for VaultError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("VaultError", 2)?;

        let code = match self {
            VaultError::KeyStore(KeyStoreError::AuthFailure) => "AUTH_FAILURE",
            VaultError::KeyStore(KeyStoreError::KeyUnavailable(_)) => "KEY_UNAVAILABLE",
            VaultError::KeyStore(KeyStoreError::UnsupportedKeySpec(_)) => "UNSUPPORTED_KEY_SPEC",
            VaultError::Corrupted(_) => "CORRUPTED",
            VaultError::Storage(_) => "STORAGE_ERROR",
        };

        state.serialize_field("code", code)?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}
