use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PcAuthError, Result};
use crate::keystore::DEFAULT_KEY_ALIAS;
use crate::storage::prefs::PREFS_FILE_NAME;
use crate::totp::{DEFAULT_DIGITS, MAX_DIGITS, MIN_DIGITS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub code_digits: u32,
    pub tick_interval_ms: u64,
    pub key_alias: String,
    pub prefs_file: String,
    pub biometric_enabled: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            code_digits: DEFAULT_DIGITS,
            tick_interval_ms: 1000,
            key_alias: DEFAULT_KEY_ALIAS.to_string(),
            prefs_file: PREFS_FILE_NAME.to_string(),
            biometric_enabled: true,
        }
    }
}

impl AppSettings {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_DIGITS..=MAX_DIGITS).contains(&self.code_digits) {
            return Err(PcAuthError::Config(format!(
                "code_digits must be between {} and {}, got {}",
                MIN_DIGITS, MAX_DIGITS, self.code_digits
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(PcAuthError::Config(
                "tick_interval_ms must be greater than zero".into(),
            ));
        }
        if self.key_alias.is_empty() {
            return Err(PcAuthError::Config("key_alias must not be empty".into()));
        }
        if self.prefs_file.is_empty() {
            return Err(PcAuthError::Config("prefs_file must not be empty".into()));
        }
        Ok(())
    }
}

fn get_settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join("settings.json")
}

pub fn load_settings(data_dir: &Path) -> Result<AppSettings> {
    let path = get_settings_path(data_dir);

    if !path.exists() {
        return Ok(AppSettings::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let settings: AppSettings = serde_json::from_str(&content)?;
    settings.validate()?;
    Ok(settings)
}

pub fn save_settings(data_dir: &Path, settings: &AppSettings) -> Result<()> {
    settings.validate()?;
    let path = get_settings_path(data_dir);
    let content = serde_json::to_string_pretty(settings)?;
    std::fs::write(&path, content)?;
    Ok(())
}
