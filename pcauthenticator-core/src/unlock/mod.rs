//! Onboarding and unlock flow.
//!
//! `UnlockMachine` holds the state and applies one transition per event.
//! `Authenticator` drives it on a dedicated task, races biometric and manual
//! authentication, and runs the code refresh cycle once unlocked.

pub mod biometric;
pub mod driver;
pub mod error;
pub mod machine;
pub mod state;

pub use biometric::{BiometricChallenger, BiometricOutcome};
pub use driver::Authenticator;
pub use error::UnlockError;
pub use machine::UnlockMachine;
pub use state::{Notice, UnlockSnapshot, UnlockState, UnlockStatus};
