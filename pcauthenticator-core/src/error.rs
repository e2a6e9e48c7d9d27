use thiserror::Error;

use crate::keystore::KeyStoreError;
use crate::totp::CodeError;
use crate::unlock::UnlockError;
use crate::vault::VaultError;

#[derive(Error, Debug)]
pub enum PcAuthError {
    #[error("Key store error: {0}")]
    KeyStore(#[from] KeyStoreError),

    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("Code generation error: {0}")]
    Code(#[from] CodeError),

    #[error("Unlock error: {0}")]
    Unlock(#[from] UnlockError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authenticator has shut down")]
    ChannelClosed,
}

impl serde::Serialize for PcAuthError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PcAuthError>;
