//! Contract for the platform key store.
//!
//! The hardware-backed store lives outside this crate. Implementations are
//! expected to keep key material inside the store and only hand back sealed
//! or unsealed payloads.

use serde::{Deserialize, Serialize};

use super::error::KeyStoreResult;

/// Nonce size for AES-GCM (96 bits = 12 bytes)
pub const NONCE_SIZE: usize = 12;

/// GCM authentication tag length appended to every ciphertext.
pub const TAG_SIZE: usize = 16;

/// Block mode requested for a generated key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockMode {
    Gcm,
}

/// Padding requested for a generated key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Padding {
    None,
}

/// Parameters for a key generated inside the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec {
    pub key_size_bits: u16,
    pub block_mode: BlockMode,
    pub padding: Padding,
    pub encrypt: bool,
    pub decrypt: bool,
    /// Whether the raw key may ever leave the store. Always `false` for the vault key.
    pub exportable: bool,
}

impl KeySpec {
    /// AES-256, GCM, no padding, encrypt+decrypt, never exportable.
    pub const fn aes_gcm_256() -> Self {
        Self {
            key_size_bits: 256,
            block_mode: BlockMode::Gcm,
            padding: Padding::None,
            encrypt: true,
            decrypt: true,
            exportable: false,
        }
    }
}

impl Default for KeySpec {
    fn default() -> Self {
        Self::aes_gcm_256()
    }
}

/// The encrypted form of a payload: nonce plus ciphertext with its GCM tag.
#[derive(Clone, PartialEq, Eq)]
pub struct SealedRecord {
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

impl SealedRecord {
    pub fn new(nonce: Vec<u8>, ciphertext: Vec<u8>) -> Self {
        Self { nonce, ciphertext }
    }
}

impl std::fmt::Debug for SealedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealedRecord")
            .field("nonce_len", &self.nonce.len())
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

/// A secure key store holding symmetric keys under string aliases.
///
/// Calls may block on hardware I/O; `KeyCustodian` moves them onto the
/// blocking thread pool.
pub trait KeyStoreBackend: Send + Sync {
    /// Generate a key under `alias` unless one already exists.
    ///
    /// Returns `true` if a new key was created.
    fn generate_key_if_absent(&self, alias: &str, spec: &KeySpec) -> KeyStoreResult<bool>;

    /// Encrypt `plaintext` under the key at `alias` with a fresh random nonce.
    fn seal(&self, alias: &str, plaintext: &[u8]) -> KeyStoreResult<SealedRecord>;

    /// Decrypt and verify `record` with the key at `alias`.
    fn unseal(&self, alias: &str, record: &SealedRecord) -> KeyStoreResult<Vec<u8>>;

    /// Remove the key under `alias`. Returns `true` if a key was removed.
    fn delete_key(&self, alias: &str) -> KeyStoreResult<bool>;
}
