//! UnlockMachine - sequences onboarding and authentication.
//!
//! One transition is computed and applied per event. Every event publishes an
//! `UnlockSnapshot` on a watch channel so observers always see the latest
//! status together with the notice the event produced.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::biometric::BiometricOutcome;
use super::error::UnlockError;
use super::state::{Notice, UnlockSnapshot, UnlockState, UnlockStatus};
use crate::vault::{Pin, PinVault};

pub struct UnlockMachine {
    vault: Arc<PinVault>,
    state: UnlockState,
    /// The stored PIN, present while `Locked` or `Unlocked`.
    pin: Option<Pin>,
    snapshot_tx: watch::Sender<UnlockSnapshot>,
}

impl UnlockMachine {
    /// Consult the vault and start in `Locked` if a PIN is recoverable,
    /// otherwise in `NoPin`.
    pub async fn initialize(vault: Arc<PinVault>) -> Self {
        let pin = vault.load().await;

        if pin.is_none() && vault.exists().unwrap_or(false) {
            // Unrecoverable record: drop it so onboarding starts clean
            warn!("Discarding unrecoverable PIN record");
            if let Err(e) = vault.clear() {
                warn!("Failed to clear unrecoverable PIN record: {}", e);
            }
        }

        let state = if pin.is_some() {
            UnlockState::Locked
        } else {
            UnlockState::NoPin
        };
        info!("Unlock flow starting in {}", state.status());

        let (snapshot_tx, _) = watch::channel(UnlockSnapshot {
            status: state.status(),
            notice: None,
        });

        Self {
            vault,
            state,
            pin,
            snapshot_tx,
        }
    }

    pub fn status(&self) -> UnlockStatus {
        self.state.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<UnlockSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// The authenticated PIN. `None` unless `Unlocked`.
    pub fn secret(&self) -> Option<&Pin> {
        match self.state {
            UnlockState::Unlocked => self.pin.as_ref(),
            _ => None,
        }
    }

    /// Handle a PIN typed by the user in whatever step is active.
    pub async fn submit_pin(&mut self, input: &str) -> Result<UnlockStatus, UnlockError> {
        let result = self.apply_pin(input).await;
        self.publish_result(&result);
        result
    }

    /// Handle the result of a biometric challenge. Only meaningful while `Locked`.
    pub fn submit_biometric(
        &mut self,
        outcome: BiometricOutcome,
    ) -> Result<UnlockStatus, UnlockError> {
        let result = self.apply_biometric(outcome);
        self.publish_result(&result);
        result
    }

    /// Publish a notice that does not change state.
    pub fn notify(&self, notice: Notice) {
        self.publish(Some(notice));
    }

    async fn apply_pin(&mut self, input: &str) -> Result<UnlockStatus, UnlockError> {
        match self.state.clone() {
            UnlockState::NoPin => {
                let candidate = Pin::parse(input)?;
                debug!("First PIN entry accepted, awaiting confirmation");
                self.transition(UnlockState::SettingPin(candidate));
                Ok(self.status())
            }

            UnlockState::SettingPin(pending) => {
                let confirmation = Pin::parse(input)?;
                if pending != confirmation {
                    info!("PIN confirmation mismatch, restarting setup");
                    self.transition(UnlockState::NoPin);
                    return Err(UnlockError::Mismatch);
                }

                self.transition(UnlockState::ConfirmingPin(pending.clone()));

                match self.vault.store(&pending).await {
                    Ok(()) => {
                        self.pin = Some(pending);
                        self.transition(UnlockState::Locked);
                        Ok(self.status())
                    }
                    Err(e) => {
                        warn!("Failed to store confirmed PIN: {}", e);
                        self.transition(UnlockState::SettingPin(pending));
                        Err(UnlockError::Store(e))
                    }
                }
            }

            UnlockState::ConfirmingPin(_) => Err(UnlockError::InvalidEvent {
                event: "PIN entry",
                status: self.status(),
            }),

            UnlockState::Locked => {
                Pin::parse(input)?;
                let matches = self.pin.as_ref().is_some_and(|pin| pin.matches(input));
                if !matches {
                    debug!("Manual PIN entry rejected");
                    return Err(UnlockError::WrongPin);
                }
                info!("Unlocked with PIN");
                self.transition(UnlockState::Unlocked);
                Ok(self.status())
            }

            UnlockState::Unlocked => Err(UnlockError::InvalidEvent {
                event: "PIN entry",
                status: self.status(),
            }),
        }
    }

    fn apply_biometric(&mut self, outcome: BiometricOutcome) -> Result<UnlockStatus, UnlockError> {
        if self.state != UnlockState::Locked {
            return Err(UnlockError::InvalidEvent {
                event: "Biometric result",
                status: self.status(),
            });
        }

        match outcome {
            BiometricOutcome::Success => {
                info!("Unlocked with biometric");
                self.transition(UnlockState::Unlocked);
                Ok(self.status())
            }
            BiometricOutcome::Failure => Err(UnlockError::BiometricFailed),
            BiometricOutcome::Cancelled => Err(UnlockError::BiometricCancelled),
        }
    }

    fn transition(&mut self, next: UnlockState) {
        debug!("Unlock state {} -> {}", self.state.status(), next.status());
        self.state = next;
        self.publish(None);
    }

    fn publish_result(&self, result: &Result<UnlockStatus, UnlockError>) {
        if let Err(e) = result {
            self.publish(Some(e.notice()));
        }
    }

    fn publish(&self, notice: Option<Notice>) {
        self.snapshot_tx.send_replace(UnlockSnapshot {
            status: self.state.status(),
            notice,
        });
    }
}

impl std::fmt::Debug for UnlockMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnlockMachine")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::keystore::{
        KeyCustodian, KeySpec, KeyStoreBackend, KeyStoreError, KeyStoreResult, SealedRecord,
        SoftwareKeyStore, DEFAULT_KEY_ALIAS,
    };
    use crate::storage::{MemoryPreferences, PreferenceStore};
    use crate::vault::PIN_ENC_KEY;

    pub(crate) fn vault() -> (Arc<SoftwareKeyStore>, Arc<MemoryPreferences>, Arc<PinVault>) {
        let store = Arc::new(SoftwareKeyStore::new());
        let prefs = Arc::new(MemoryPreferences::new());
        let vault = Arc::new(PinVault::new(
            KeyCustodian::new(store.clone(), DEFAULT_KEY_ALIAS),
            prefs.clone(),
        ));
        (store, prefs, vault)
    }

    /// Key store that is permanently offline.
    struct BrokenKeyStore;

    impl KeyStoreBackend for BrokenKeyStore {
        fn generate_key_if_absent(&self, _alias: &str, _spec: &KeySpec) -> KeyStoreResult<bool> {
            Err(KeyStoreError::KeyUnavailable("store offline".into()))
        }

        fn seal(&self, _alias: &str, _plaintext: &[u8]) -> KeyStoreResult<SealedRecord> {
            Err(KeyStoreError::KeyUnavailable("store offline".into()))
        }

        fn unseal(&self, _alias: &str, _record: &SealedRecord) -> KeyStoreResult<Vec<u8>> {
            Err(KeyStoreError::KeyUnavailable("store offline".into()))
        }

        fn delete_key(&self, _alias: &str) -> KeyStoreResult<bool> {
            Err(KeyStoreError::KeyUnavailable("store offline".into()))
        }
    }

    #[tokio::test]
    async fn test_starts_in_no_pin_without_record() {
        let (_, _, vault) = vault();
        let machine = UnlockMachine::initialize(vault).await;
        assert_eq!(machine.status(), UnlockStatus::NoPin);
        assert!(machine.secret().is_none());
    }

    #[tokio::test]
    async fn test_invalid_first_entry_stays_in_no_pin() {
        let (_, _, vault) = vault();
        let mut machine = UnlockMachine::initialize(vault).await;
        let snapshots = machine.subscribe();

        let err = machine.submit_pin("12a4").await.unwrap_err();
        assert!(matches!(err, UnlockError::Validation(_)));
        assert_eq!(machine.status(), UnlockStatus::NoPin);

        let snapshot = snapshots.borrow().clone();
        assert_eq!(snapshot.status, UnlockStatus::NoPin);
        assert_eq!(snapshot.notice.unwrap().code, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_mismatched_confirmation_returns_to_no_pin() {
        let (_, _, vault) = vault();
        let mut machine = UnlockMachine::initialize(vault.clone()).await;

        assert_eq!(
            machine.submit_pin("123456").await.unwrap(),
            UnlockStatus::SettingPin
        );
        assert!(matches!(
            machine.submit_pin("654321").await,
            Err(UnlockError::Mismatch)
        ));

        assert_eq!(machine.status(), UnlockStatus::NoPin);
        assert!(!vault.exists().unwrap());
        assert_eq!(vault.load().await, None);
    }

    #[tokio::test]
    async fn test_matching_confirmation_stores_and_locks() {
        let (_, _, vault) = vault();
        let mut machine = UnlockMachine::initialize(vault.clone()).await;

        machine.submit_pin("123456").await.unwrap();
        assert_eq!(
            machine.submit_pin("123456").await.unwrap(),
            UnlockStatus::Locked
        );

        assert_eq!(vault.load().await, Some(Pin::parse("123456").unwrap()));
        assert!(machine.secret().is_none());
    }

    #[tokio::test]
    async fn test_invalid_confirmation_keeps_pending_pin() {
        let (_, _, vault) = vault();
        let mut machine = UnlockMachine::initialize(vault).await;

        machine.submit_pin("123456").await.unwrap();
        assert!(matches!(
            machine.submit_pin("12").await,
            Err(UnlockError::Validation(_))
        ));
        assert_eq!(machine.status(), UnlockStatus::SettingPin);
        assert_eq!(
            machine.submit_pin("123456").await.unwrap(),
            UnlockStatus::Locked
        );
    }

    #[tokio::test]
    async fn test_store_failure_stays_in_setting_pin() {
        let prefs = Arc::new(MemoryPreferences::new());
        let vault = Arc::new(PinVault::new(
            KeyCustodian::new(Arc::new(BrokenKeyStore), DEFAULT_KEY_ALIAS),
            prefs,
        ));
        let mut machine = UnlockMachine::initialize(vault.clone()).await;

        machine.submit_pin("123456").await.unwrap();
        let err = machine.submit_pin("123456").await.unwrap_err();

        assert!(matches!(err, UnlockError::Store(_)));
        assert_eq!(machine.status(), UnlockStatus::SettingPin);
        assert!(!vault.exists().unwrap());
    }

    #[tokio::test]
    async fn test_restart_with_stored_pin_starts_locked() {
        let (_, _, vault) = vault();
        vault.store(&Pin::parse("135790").unwrap()).await.unwrap();

        let machine = UnlockMachine::initialize(vault).await;
        assert_eq!(machine.status(), UnlockStatus::Locked);
    }

    #[tokio::test]
    async fn test_wrong_pin_stays_locked_then_correct_unlocks() {
        let (_, _, vault) = vault();
        vault.store(&Pin::parse("135790").unwrap()).await.unwrap();
        let mut machine = UnlockMachine::initialize(vault).await;

        for _ in 0..5 {
            assert!(matches!(
                machine.submit_pin("000000").await,
                Err(UnlockError::WrongPin)
            ));
            assert_eq!(machine.status(), UnlockStatus::Locked);
        }

        assert_eq!(
            machine.submit_pin("135790").await.unwrap(),
            UnlockStatus::Unlocked
        );
        assert_eq!(machine.secret().unwrap().as_str(), "135790");
    }

    #[tokio::test]
    async fn test_biometric_outcomes() {
        let (_, _, vault) = vault();
        vault.store(&Pin::parse("135790").unwrap()).await.unwrap();
        let mut machine = UnlockMachine::initialize(vault).await;

        assert!(matches!(
            machine.submit_biometric(BiometricOutcome::Failure),
            Err(UnlockError::BiometricFailed)
        ));
        assert!(matches!(
            machine.submit_biometric(BiometricOutcome::Cancelled),
            Err(UnlockError::BiometricCancelled)
        ));
        assert_eq!(machine.status(), UnlockStatus::Locked);

        assert_eq!(
            machine.submit_biometric(BiometricOutcome::Success).unwrap(),
            UnlockStatus::Unlocked
        );
        assert_eq!(machine.secret().unwrap().as_str(), "135790");
    }

    #[tokio::test]
    async fn test_no_second_transition_after_unlock() {
        let (_, _, vault) = vault();
        vault.store(&Pin::parse("135790").unwrap()).await.unwrap();
        let mut machine = UnlockMachine::initialize(vault).await;

        machine.submit_pin("135790").await.unwrap();
        assert!(matches!(
            machine.submit_biometric(BiometricOutcome::Success),
            Err(UnlockError::InvalidEvent { .. })
        ));
        assert!(matches!(
            machine.submit_pin("135790").await,
            Err(UnlockError::InvalidEvent { .. })
        ));
        assert_eq!(machine.status(), UnlockStatus::Unlocked);
    }

    #[tokio::test]
    async fn test_biometric_ignored_during_onboarding() {
        let (_, _, vault) = vault();
        let mut machine = UnlockMachine::initialize(vault).await;

        assert!(matches!(
            machine.submit_biometric(BiometricOutcome::Success),
            Err(UnlockError::InvalidEvent { .. })
        ));
        assert_eq!(machine.status(), UnlockStatus::NoPin);
    }

    #[tokio::test]
    async fn test_tampered_record_forces_onboarding_and_is_cleared() {
        let (_, prefs, vault) = vault();
        vault.store(&Pin::parse("135790").unwrap()).await.unwrap();
        prefs.set(PIN_ENC_KEY, "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA==").unwrap();

        let machine = UnlockMachine::initialize(vault.clone()).await;
        assert_eq!(machine.status(), UnlockStatus::NoPin);
        assert!(!vault.exists().unwrap());
    }

    #[tokio::test]
    async fn test_invalidated_key_forces_onboarding() {
        let (store, _, vault) = vault();
        vault.store(&Pin::parse("135790").unwrap()).await.unwrap();
        store.invalidate(DEFAULT_KEY_ALIAS).unwrap();

        let mut machine = UnlockMachine::initialize(vault.clone()).await;
        assert_eq!(machine.status(), UnlockStatus::NoPin);

        machine.submit_pin("111111").await.unwrap();
        assert_eq!(
            machine.submit_pin("111111").await.unwrap(),
            UnlockStatus::Locked
        );
        assert_eq!(vault.load().await.unwrap(), Pin::parse("111111").unwrap());

        let mut machine = UnlockMachine::initialize(vault).await;
        assert_eq!(machine.status(), UnlockStatus::Locked);
        assert!(matches!(
            machine.submit_pin("135790").await,
            Err(UnlockError::WrongPin)
        ));
        assert_eq!(
            machine.submit_pin("111111").await.unwrap(),
            UnlockStatus::Unlocked
        );
    }
}
