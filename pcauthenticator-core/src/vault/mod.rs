//! PIN vault.
//!
//! The user's PIN is sealed with the key custodian's AES-256-GCM key and kept
//! in the preference store as two base64 entries. Any failure to recover it
//! is reported as "no PIN", which sends the user back through onboarding.

pub mod error;
pub mod manager;
pub mod pin;

pub use error::{VaultError, VaultResult};
pub use manager::{PinVault, PIN_ENC_KEY, PIN_IV_KEY};
pub use pin::{Pin, PinError, PIN_LENGTH};
