//! In-process key store using AES-256-GCM.
//!
//! Keys never leave this struct, mirroring the contract of a hardware store.
//! Used on hosts without a secure element and as the test double for the
//! platform store.

use std::collections::HashMap;
use std::sync::Mutex;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::backend::{BlockMode, KeySpec, KeyStoreBackend, Padding, SealedRecord, NONCE_SIZE};
use super::error::{KeyStoreError, KeyStoreResult};

/// A 256-bit key with automatic zeroization on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct StoreKey {
    key: [u8; 32],
    #[zeroize(skip)]
    invalidated: bool,
}

impl StoreKey {
    fn generate() -> Self {
        let mut key = [0u8; 32];
        rand::rng().fill_bytes(&mut key);
        Self {
            key,
            invalidated: false,
        }
    }

    fn cipher(&self) -> KeyStoreResult<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| KeyStoreError::KeyUnavailable(format!("Invalid key: {}", e)))
    }
}

impl std::fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log the actual key material
        f.debug_struct("StoreKey")
            .field("key", &"[REDACTED]")
            .field("invalidated", &self.invalidated)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct SoftwareKeyStore {
    keys: Mutex<HashMap<String, StoreKey>>,
}

impl SoftwareKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the key under `alias` as permanently unusable, the way a platform
    /// store does after a security event such as a lock-screen reset.
    pub fn invalidate(&self, alias: &str) -> KeyStoreResult<()> {
        let mut keys = self.lock()?;
        match keys.get_mut(alias) {
            Some(key) => {
                warn!("Invalidating key under alias {}", alias);
                key.invalidated = true;
                Ok(())
            }
            None => Err(KeyStoreError::KeyUnavailable(format!(
                "No key under alias {}",
                alias
            ))),
        }
    }

    pub fn contains_alias(&self, alias: &str) -> KeyStoreResult<bool> {
        Ok(self.lock()?.contains_key(alias))
    }

    fn lock(&self) -> KeyStoreResult<std::sync::MutexGuard<'_, HashMap<String, StoreKey>>> {
        self.keys
            .lock()
            .map_err(|_| KeyStoreError::KeyUnavailable("Key store lock poisoned".into()))
    }

    fn usable_key(&self, alias: &str) -> KeyStoreResult<StoreKey> {
        let keys = self.lock()?;
        let key = keys.get(alias).ok_or_else(|| {
            KeyStoreError::KeyUnavailable(format!("No key under alias {}", alias))
        })?;
        if key.invalidated {
            return Err(KeyStoreError::KeyUnavailable(format!(
                "Key under alias {} has been invalidated",
                alias
            )));
        }
        Ok(key.clone())
    }
}

impl KeyStoreBackend for SoftwareKeyStore {
    fn generate_key_if_absent(&self, alias: &str, spec: &KeySpec) -> KeyStoreResult<bool> {
        if spec.key_size_bits != 256
            || spec.block_mode != BlockMode::Gcm
            || spec.padding != Padding::None
        {
            return Err(KeyStoreError::UnsupportedKeySpec(format!("{:?}", spec)));
        }
        if !spec.encrypt || !spec.decrypt {
            return Err(KeyStoreError::UnsupportedKeySpec(
                "Key must allow both encrypt and decrypt".into(),
            ));
        }

        let mut keys = self.lock()?;
        if keys.contains_key(alias) {
            debug!("Key already present under alias {}", alias);
            return Ok(false);
        }

        keys.insert(alias.to_string(), StoreKey::generate());
        info!("Generated new AES-256-GCM key under alias {}", alias);
        Ok(true)
    }

    fn seal(&self, alias: &str, plaintext: &[u8]) -> KeyStoreResult<SealedRecord> {
        let cipher = self.usable_key(alias)?.cipher()?;

        // Generate random nonce
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| KeyStoreError::KeyUnavailable(format!("Encryption failed: {}", e)))?;

        Ok(SealedRecord::new(nonce_bytes.to_vec(), ciphertext))
    }

    fn unseal(&self, alias: &str, record: &SealedRecord) -> KeyStoreResult<Vec<u8>> {
        let cipher = self.usable_key(alias)?.cipher()?;

        if record.nonce.len() != NONCE_SIZE {
            debug!(
                "Rejecting sealed record with {}-byte nonce",
                record.nonce.len()
            );
            return Err(KeyStoreError::AuthFailure);
        }
        let nonce = Nonce::from_slice(&record.nonce);

        // Decryption failure = tampered record or a different key
        cipher
            .decrypt(nonce, record.ciphertext.as_ref())
            .map_err(|_| KeyStoreError::AuthFailure)
    }

    fn delete_key(&self, alias: &str) -> KeyStoreResult<bool> {
        let removed = self.lock()?.remove(alias).is_some();
        if removed {
            info!("Deleted key under alias {}", alias);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::backend::TAG_SIZE;

    const ALIAS: &str = "auth_key";

    fn store_with_key() -> SoftwareKeyStore {
        let store = SoftwareKeyStore::new();
        store
            .generate_key_if_absent(ALIAS, &KeySpec::aes_gcm_256())
            .unwrap();
        store
    }

    #[test]
    fn test_generate_key_is_idempotent() {
        let store = SoftwareKeyStore::new();
        assert!(store
            .generate_key_if_absent(ALIAS, &KeySpec::aes_gcm_256())
            .unwrap());
        assert!(!store
            .generate_key_if_absent(ALIAS, &KeySpec::aes_gcm_256())
            .unwrap());
        assert!(store.contains_alias(ALIAS).unwrap());
    }

    #[test]
    fn test_rejects_unsupported_spec() {
        let store = SoftwareKeyStore::new();
        let spec = KeySpec {
            key_size_bits: 128,
            ..KeySpec::aes_gcm_256()
        };
        assert!(matches!(
            store.generate_key_if_absent(ALIAS, &spec),
            Err(KeyStoreError::UnsupportedKeySpec(_))
        ));
    }

    #[test]
    fn test_seal_unseal_roundtrip() {
        let store = store_with_key();
        let record = store.seal(ALIAS, b"123456").unwrap();

        assert_eq!(record.nonce.len(), NONCE_SIZE);
        assert_eq!(record.ciphertext.len(), 6 + TAG_SIZE);
        assert_eq!(store.unseal(ALIAS, &record).unwrap(), b"123456");
    }

    #[test]
    fn test_seal_uses_fresh_nonce() {
        let store = store_with_key();
        let a = store.seal(ALIAS, b"123456").unwrap();
        let b = store.seal(ALIAS, b"123456").unwrap();

        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_every_bit_flip_fails_authentication() {
        let store = store_with_key();
        let record = store.seal(ALIAS, b"123456").unwrap();

        for byte in 0..record.ciphertext.len() {
            for bit in 0..8 {
                let mut tampered = record.clone();
                tampered.ciphertext[byte] ^= 1 << bit;
                assert_eq!(
                    store.unseal(ALIAS, &tampered),
                    Err(KeyStoreError::AuthFailure)
                );
            }
        }

        for byte in 0..record.nonce.len() {
            for bit in 0..8 {
                let mut tampered = record.clone();
                tampered.nonce[byte] ^= 1 << bit;
                assert_eq!(
                    store.unseal(ALIAS, &tampered),
                    Err(KeyStoreError::AuthFailure)
                );
            }
        }
    }

    #[test]
    fn test_wrong_nonce_size_fails_authentication() {
        let store = store_with_key();
        let mut record = store.seal(ALIAS, b"123456").unwrap();
        record.nonce.push(0);

        assert_eq!(store.unseal(ALIAS, &record), Err(KeyStoreError::AuthFailure));
    }

    #[test]
    fn test_record_from_other_key_fails_authentication() {
        let store = store_with_key();
        let other = store_with_key();
        let record = other.seal(ALIAS, b"123456").unwrap();

        assert_eq!(store.unseal(ALIAS, &record), Err(KeyStoreError::AuthFailure));
    }

    #[test]
    fn test_invalidated_key_is_unavailable() {
        let store = store_with_key();
        let record = store.seal(ALIAS, b"123456").unwrap();
        store.invalidate(ALIAS).unwrap();

        assert!(matches!(
            store.unseal(ALIAS, &record),
            Err(KeyStoreError::KeyUnavailable(_))
        ));
        assert!(matches!(
            store.seal(ALIAS, b"123456"),
            Err(KeyStoreError::KeyUnavailable(_))
        ));
    }

    #[test]
    fn test_missing_key_is_unavailable() {
        let store = SoftwareKeyStore::new();
        let record = SealedRecord::new(vec![0; NONCE_SIZE], vec![0; TAG_SIZE]);

        assert!(matches!(
            store.unseal(ALIAS, &record),
            Err(KeyStoreError::KeyUnavailable(_))
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = StoreKey::generate();
        let rendered = format!("{:?}", key);
        assert!(rendered.contains("REDACTED"));
    }
}
