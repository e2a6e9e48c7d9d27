mod config;
mod prefs;

pub use config::{load_settings, save_settings, AppSettings};
pub use prefs::{FilePreferences, MemoryPreferences, PreferenceStore, PREFS_FILE_NAME};
