//! Contract for the platform biometric prompt.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of one biometric challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiometricOutcome {
    Success,
    /// The sensor rejected the user.
    Failure,
    /// The user dismissed the prompt or the platform cancelled it.
    Cancelled,
}

#[async_trait]
pub trait BiometricChallenger: Send + Sync {
    /// Show the prompt and wait for the user. Dropping the future cancels it.
    async fn authenticate(&self) -> BiometricOutcome;
}
