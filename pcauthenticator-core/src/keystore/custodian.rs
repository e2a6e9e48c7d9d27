//! KeyCustodian - owns the single vault key and exposes seal/unseal.
//!
//! Backend calls can block on hardware I/O, so every call is moved onto the
//! blocking thread pool and awaited. The key itself is never returned.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use super::backend::{KeySpec, KeyStoreBackend, SealedRecord};
use super::error::{KeyStoreError, KeyStoreResult};

/// Fixed alias of the vault key in the platform store.
pub const DEFAULT_KEY_ALIAS: &str = "auth_key";

#[derive(Clone)]
pub struct KeyCustodian {
    backend: Arc<dyn KeyStoreBackend>,
    alias: Arc<str>,
    spec: KeySpec,
}

impl KeyCustodian {
    pub fn new(backend: Arc<dyn KeyStoreBackend>, alias: impl Into<String>) -> Self {
        Self {
            backend,
            alias: Arc::from(alias.into()),
            spec: KeySpec::aes_gcm_256(),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Create the vault key if it does not exist yet. Safe to call repeatedly.
    pub async fn ensure_key(&self) -> KeyStoreResult<()> {
        let backend = self.backend.clone();
        let alias = self.alias.clone();
        let spec = self.spec;

        let created = run_blocking(move || backend.generate_key_if_absent(&alias, &spec)).await?;
        if created {
            info!("Created vault key under alias {}", self.alias);
        } else {
            debug!("Vault key already present under alias {}", self.alias);
        }
        Ok(())
    }

    /// Encrypt `plaintext` under the vault key, creating the key on first use.
    ///
    /// A key the store reports as unavailable (invalidated after a security
    /// event, for instance) is replaced with a fresh one. Anything sealed
    /// under the old key is already unrecoverable, and the new record
    /// supersedes it.
    pub async fn seal(&self, plaintext: Zeroizing<Vec<u8>>) -> KeyStoreResult<SealedRecord> {
        let backend = self.backend.clone();
        let alias = self.alias.clone();
        let spec = self.spec;

        run_blocking(move || {
            backend.generate_key_if_absent(&alias, &spec)?;
            match backend.seal(&alias, &plaintext) {
                Err(KeyStoreError::KeyUnavailable(reason)) => {
                    warn!("Replacing unusable vault key under alias {}: {}", alias, reason);
                    backend.delete_key(&alias)?;
                    backend.generate_key_if_absent(&alias, &spec)?;
                    backend.seal(&alias, &plaintext)
                }
                result => result,
            }
        })
        .await
    }

    /// Decrypt and verify a sealed record.
    ///
    /// Never creates a key: a missing key means the record is unrecoverable.
    pub async fn unseal(&self, record: SealedRecord) -> KeyStoreResult<Zeroizing<Vec<u8>>> {
        let backend = self.backend.clone();
        let alias = self.alias.clone();

        run_blocking(move || backend.unseal(&alias, &record).map(Zeroizing::new)).await
    }
}

impl std::fmt::Debug for KeyCustodian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCustodian")
            .field("alias", &self.alias)
            .field("spec", &self.spec)
            .finish()
    }
}

async fn run_blocking<T, F>(f: F) -> KeyStoreResult<T>
where
    F: FnOnce() -> KeyStoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("Key store task failed: {}", e);
        KeyStoreError::KeyUnavailable(format!("Key store task failed: {}", e))
    })?
}
