//! Error taxonomy of the session core.
//!
//! Each operation has its own error enum so callers can match on exactly the
//! failures that operation can produce. Nothing here is fatal to the process.

use audio_session_types::{ActivationState, Category, OptionSet};
use thiserror::Error;

/// Failure reported by a platform collaborator (session API or playback engine).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("platform error {code}: {message}")]
pub struct PlatformError {
    /// Platform status code (an `OSStatus` on Apple platforms).
    pub code: i32,
    pub message: String,
}

impl PlatformError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Rejected configuration. The previous configuration stays in effect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("options {offending} are incompatible with category {category}")]
    IncompatibleOptions {
        category: Category,
        /// The requested flags that caused the rejection.
        offending: OptionSet,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActivationError {
    #[error("session cannot be activated while {0}")]
    NotInactive(ActivationState),
    /// Reactivation needs an active session.
    #[error("session cannot be reactivated while {0}")]
    NotActive(ActivationState),
    #[error("session is interrupted")]
    Interrupted,
    #[error("platform rejected activation (code {0})")]
    PlatformRejected(i32),
}

/// Deactivation failure. The state machine has still settled to `Inactive`
/// when `PlatformRejected` is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeactivationError {
    #[error("session cannot be deactivated while {0}")]
    NotActive(ActivationState),
    #[error("platform rejected deactivation (code {0})")]
    PlatformRejected(i32),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("audio session is not active")]
    NotActive,
    #[error("asset unavailable: {0}")]
    AssetUnavailable(String),
    #[error("playback engine refused to start (code {0})")]
    StartFailed(i32),
}

/// Error returned by [`SessionManager::configure`](crate::SessionManager::configure).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigureError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The configuration was stored but re-applying it to the active session failed.
    #[error("reconfiguration failed: {0}")]
    Activation(#[from] ActivationError),
}

/// Error returned by [`SessionManager::play`](crate::SessionManager::play).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayError {
    #[error(transparent)]
    Activation(#[from] ActivationError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}
