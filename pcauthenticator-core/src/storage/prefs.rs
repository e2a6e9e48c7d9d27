//! Durable key-value preferences used by the PIN vault.
//!
//! Batched writes (`set_many`) are applied atomically: a reader using
//! `get_many` sees either every entry of a batch or none of it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::{PcAuthError, Result};

/// Default preferences file name inside the data directory.
pub const PREFS_FILE_NAME: &str = "secure_prefs.json";

pub trait PreferenceStore: Send + Sync {
    /// Read several entries under one consistent snapshot.
    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>>;

    /// Write several entries as one atomic commit.
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()>;

    /// Remove several entries as one atomic commit.
    fn remove_many(&self, keys: &[&str]) -> Result<()>;

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get_many(&[key])?.pop().flatten())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_many(&[(key, value)])
    }
}

fn lock_poisoned() -> PcAuthError {
    PcAuthError::Config("Preference store lock poisoned".into())
}

/// Ephemeral preferences, lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        let entries = self.entries.lock().map_err(|_| lock_poisoned())?;
        Ok(keys.iter().map(|k| entries.get(*k).cloned()).collect())
    }

    fn set_many(&self, batch: &[(&str, &str)]) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| lock_poisoned())?;
        for (key, value) in batch {
            entries.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| lock_poisoned())?;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

/// Preferences persisted as a JSON object in a single file.
///
/// Every commit rewrites the whole file through a temp file and a rename,
/// so a crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FilePreferences {
    /// Open (or lazily create) the preferences file at `path`.
    ///
    /// A file that does not parse is moved aside to `<name>.corrupt` and the
    /// store starts empty, so the vault sees no record rather than failing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Preferences at {:?} are corrupt, starting empty: {}", path, e);
                    let quarantine = path.with_extension("json.corrupt");
                    if let Err(e) = std::fs::rename(&path, &quarantine) {
                        warn!("Failed to move corrupt preferences aside: {}", e);
                    }
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        debug!("Opened preferences at {:?} ({} entries)", path, entries.len());

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Open `secure_prefs.json` inside `data_dir`.
    pub fn in_dir(data_dir: &Path) -> Result<Self> {
        Self::open(data_dir.join(PREFS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn commit(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let content = serde_json::to_vec_pretty(entries)?;

        // Write atomically (write to temp file, then rename)
        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, &self.path)?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&self.path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(&self.path, perms)?;
        }

        Ok(())
    }
}

impl PreferenceStore for FilePreferences {
    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        let entries = self.entries.lock().map_err(|_| lock_poisoned())?;
        Ok(keys.iter().map(|k| entries.get(*k).cloned()).collect())
    }

    fn set_many(&self, batch: &[(&str, &str)]) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| lock_poisoned())?;
        let mut updated = entries.clone();
        for (key, value) in batch {
            updated.insert((*key).to_string(), (*value).to_string());
        }
        // Only publish the new map once it is on disk
        self.commit(&updated)?;
        *entries = updated;
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| lock_poisoned())?;
        let mut updated = entries.clone();
        for key in keys {
            updated.remove(*key);
        }
        self.commit(&updated)?;
        *entries = updated;
        Ok(())
    }
}
