//! Key store error types.
//!
//! Both variants mean the sealed secret cannot be recovered. Callers must not
//! retry the same record and must treat them identically.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyStoreError {
    /// The key store is inaccessible, the key is missing, or the key was
    /// invalidated by a platform security event.
    #[error("Key unavailable: {0}")]
    KeyUnavailable(String),

    /// The authentication tag did not verify, the nonce had the wrong size,
    /// or the record was sealed under a different key.
    #[error("Authentication failed: sealed record was tampered with or corrupted")]
    AuthFailure,

    /// The backend cannot create a key matching the requested parameters.
    #[error("Unsupported key spec: {0}")]
    UnsupportedKeySpec(String),
}

/// Result type alias for key store operations.
pub type KeyStoreResult<T> = std::result::Result<T, KeyStoreError>;
