//! PinVault - persists the user's PIN as a sealed record.
//!
//! The record is stored as two base64 preference entries, the nonce and the
//! ciphertext with its GCM tag. Both are written in a single batch so readers
//! never pair a nonce with a ciphertext from another seal. The plaintext PIN
//! is never persisted.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::keystore::{KeyCustodian, SealedRecord};
use crate::storage::PreferenceStore;
use crate::vault::error::{VaultError, VaultResult};
use crate::vault::pin::Pin;

/// Preference key holding the base64 AEAD nonce.
pub const PIN_IV_KEY: &str = "user_pin_iv";

/// Preference key holding the base64 ciphertext and tag.
pub const PIN_ENC_KEY: &str = "user_pin_enc";

pub struct PinVault {
    custodian: KeyCustodian,
    prefs: Arc<dyn PreferenceStore>,
}

impl PinVault {
    pub fn new(custodian: KeyCustodian, prefs: Arc<dyn PreferenceStore>) -> Self {
        Self { custodian, prefs }
    }

    /// Check whether both halves of a sealed record are persisted.
    ///
    /// Does not unseal; a record that exists may still fail to load.
    pub fn exists(&self) -> VaultResult<bool> {
        let entries = self.prefs.get_many(&[PIN_IV_KEY, PIN_ENC_KEY])?;
        Ok(entries.iter().all(Option::is_some))
    }

    /// Load the stored PIN.
    ///
    /// Returns `None` when no PIN was set, and also when the record cannot be
    /// recovered (tampered, wrong key, key invalidated, or not a valid PIN).
    /// Losing the secret is treated the same as never having set one.
    pub async fn load(&self) -> Option<Pin> {
        match self.try_load().await {
            Ok(Some(pin)) => {
                debug!("Loaded PIN from vault");
                Some(pin)
            }
            Ok(None) => {
                debug!("No PIN stored in vault");
                None
            }
            Err(e) => {
                warn!("Stored PIN is unrecoverable, treating as not set: {}", e);
                None
            }
        }
    }

    async fn try_load(&self) -> VaultResult<Option<Pin>> {
        let mut entries = self.prefs.get_many(&[PIN_IV_KEY, PIN_ENC_KEY])?.into_iter();
        let (Some(Some(iv)), Some(Some(enc))) = (entries.next(), entries.next()) else {
            return Ok(None);
        };

        let nonce = STANDARD
            .decode(iv)
            .map_err(|e| VaultError::Corrupted(format!("Invalid nonce encoding: {}", e)))?;
        let ciphertext = STANDARD
            .decode(enc)
            .map_err(|e| VaultError::Corrupted(format!("Invalid ciphertext encoding: {}", e)))?;

        let plaintext = self
            .custodian
            .unseal(SealedRecord::new(nonce, ciphertext))
            .await?;

        let pin = Pin::from_bytes(&plaintext)
            .map_err(|e| VaultError::Corrupted(format!("Unsealed payload is not a PIN: {}", e)))?;
        Ok(Some(pin))
    }

    /// Seal and persist `pin`, replacing any previously stored record.
    pub async fn store(&self, pin: &Pin) -> VaultResult<()> {
        let record = self
            .custodian
            .seal(Zeroizing::new(pin.as_bytes().to_vec()))
            .await?;

        let iv = STANDARD.encode(&record.nonce);
        let enc = STANDARD.encode(&record.ciphertext);
        self.prefs
            .set_many(&[(PIN_IV_KEY, iv.as_str()), (PIN_ENC_KEY, enc.as_str())])?;

        info!("PIN sealed and stored in vault");
        Ok(())
    }

    /// Remove the stored record. Idempotent.
    pub fn clear(&self) -> VaultResult<()> {
        self.prefs.remove_many(&[PIN_IV_KEY, PIN_ENC_KEY])?;
        info!("Cleared stored PIN record");
        Ok(())
    }
}

impl std::fmt::Debug for PinVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinVault")
            .field("custodian", &self.custodian)
            .finish_non_exhaustive()
    }
}
