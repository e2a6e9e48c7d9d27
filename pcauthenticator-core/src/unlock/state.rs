//! Unlock flow states and the snapshot published to observers.

use serde::{Deserialize, Serialize};

use crate::vault::Pin;

/// The active state of the unlock flow.
///
/// Transitions:
/// - `NoPin` → `SettingPin` (valid first entry)
/// - `SettingPin` → `ConfirmingPin` (matching confirmation, store in flight)
/// - `SettingPin` → `NoPin` (confirmation mismatch)
/// - `ConfirmingPin` → `Locked` (stored) or back to `SettingPin` (store failed)
/// - `Locked` → `Unlocked` (correct PIN or biometric success)
#[derive(Clone, PartialEq, Eq)]
pub enum UnlockState {
    NoPin,
    SettingPin(Pin),
    ConfirmingPin(Pin),
    Locked,
    Unlocked,
}

impl UnlockState {
    pub fn status(&self) -> UnlockStatus {
        match self {
            Self::NoPin => UnlockStatus::NoPin,
            Self::SettingPin(_) => UnlockStatus::SettingPin,
            Self::ConfirmingPin(_) => UnlockStatus::ConfirmingPin,
            Self::Locked => UnlockStatus::Locked,
            Self::Unlocked => UnlockStatus::Unlocked,
        }
    }
}

impl std::fmt::Debug for UnlockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Pending PINs are redacted by Pin's own Debug
        write!(f, "{}", self.status())
    }
}

/// `UnlockState` without the pending PIN, safe to hand to the presentation layer.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum UnlockStatus {
    /// No PIN configured (first run, or the stored PIN was unrecoverable)
    #[default]
    NoPin,
    /// A first PIN was entered and awaits confirmation
    SettingPin,
    /// The confirmed PIN is being sealed and stored
    ConfirmingPin,
    /// A PIN is configured and the user must authenticate
    Locked,
    /// Authenticated; codes are being generated
    Unlocked,
}

impl std::fmt::Display for UnlockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPin => write!(f, "NoPin"),
            Self::SettingPin => write!(f, "SettingPin"),
            Self::ConfirmingPin => write!(f, "ConfirmingPin"),
            Self::Locked => write!(f, "Locked"),
            Self::Unlocked => write!(f, "Unlocked"),
        }
    }
}

/// Transient, user-facing message tied to the state it was raised in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub code: String,
    pub message: String,
}

/// What observers of the unlock flow see after every event.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockSnapshot {
    pub status: UnlockStatus,
    pub notice: Option<Notice>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_pending_pin() {
        let state = UnlockState::SettingPin(Pin::parse("123456").unwrap());
        let rendered = format!("{:?}", state);
        assert_eq!(rendered, "SettingPin");
    }

    #[test]
    fn test_snapshot_serialization() {
        let snapshot = UnlockSnapshot {
            status: UnlockStatus::Locked,
            notice: Some(Notice {
                code: "WRONG_PIN".into(),
                message: "Wrong PIN".into(),
            }),
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains(r#""status":"Locked""#));
        assert!(json.contains("WRONG_PIN"));
    }
}
