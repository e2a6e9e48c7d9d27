//! Key custody for the PIN vault.
//!
//! One AES-256-GCM key lives in a platform key store under a fixed alias.
//! The `KeyCustodian` seals and unseals payloads with it and never exposes
//! the key material. Platform stores plug in through `KeyStoreBackend`.

pub mod backend;
pub mod custodian;
pub mod error;
pub mod software;

pub use backend::{KeySpec, KeyStoreBackend, SealedRecord, NONCE_SIZE};
pub use custodian::{KeyCustodian, DEFAULT_KEY_ALIAS};
pub use error::{KeyStoreError, KeyStoreResult};
pub use software::SoftwareKeyStore;
