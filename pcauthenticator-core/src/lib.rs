mod clipboard;
mod error;
pub mod keystore;
pub mod refresh;
pub mod storage;
pub mod totp;
pub mod unlock;
pub mod vault;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use clipboard::{CodeSink, MemorySink, NullSink};
pub use error::{PcAuthError, Result};
pub use keystore::{KeyCustodian, KeyStoreBackend, SoftwareKeyStore};
pub use refresh::{Clock, CodeTick, RefreshScheduler, SystemClock};
pub use storage::{load_settings, AppSettings, FilePreferences};
pub use totp::generate_code;
pub use unlock::{Authenticator, BiometricChallenger, BiometricOutcome, UnlockMachine, UnlockStatus};
pub use vault::{Pin, PinVault};

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG`; defaults to debug output for this crate.
pub fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pcauthenticator_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| PcAuthError::Config(format!("Failed to install tracing subscriber: {}", e)))
}

/// Platform capabilities the core calls through but never implements.
pub struct Collaborators {
    pub key_store: Arc<dyn KeyStoreBackend>,
    pub biometric: Option<Arc<dyn BiometricChallenger>>,
    pub sink: Arc<dyn CodeSink>,
    pub clock: Arc<dyn Clock>,
}

/// Wire up the vault and unlock flow for the installation in `data_dir`.
///
/// Creates the vault key if needed, picks the initial state from the stored
/// PIN, and spawns the authenticator task.
pub async fn launch(data_dir: &Path, collaborators: Collaborators) -> Result<Authenticator> {
    std::fs::create_dir_all(data_dir)?;

    let settings = load_settings(data_dir).unwrap_or_else(|e| {
        warn!("Falling back to default settings: {}", e);
        AppSettings::default()
    });

    let custodian = KeyCustodian::new(collaborators.key_store, settings.key_alias.clone());
    custodian.ensure_key().await?;

    let prefs = Arc::new(FilePreferences::open(data_dir.join(&settings.prefs_file))?);
    let vault = Arc::new(PinVault::new(custodian, prefs));
    let machine = UnlockMachine::initialize(vault).await;
    info!("Starting authenticator in {}", machine.status());

    let scheduler = RefreshScheduler::new(
        collaborators.clock,
        settings.code_digits,
        Duration::from_millis(settings.tick_interval_ms),
    );
    let biometric = if settings.biometric_enabled {
        collaborators.biometric
    } else {
        None
    };

    Ok(Authenticator::spawn(
        machine,
        scheduler,
        biometric,
        collaborators.sink,
    ))
}
