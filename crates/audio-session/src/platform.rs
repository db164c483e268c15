//! Seams to the platform collaborators.
//!
//! The session core never talks to an OS API directly. It drives an
//! [`AudioSessionPlatform`] (category, activation, route, notifications) and a
//! [`PlaybackEngine`] (asset load, play/stop, completion). The desktop backend in
//! [`crate::desktop`] implements both over CPAL and Symphonia; tests use in-memory
//! fakes.

use std::path::PathBuf;

use audio_session_types::{RouteChangeReason, RouteSnapshot, SessionConfiguration};
use crossbeam_channel::Receiver;

use crate::error::PlatformError;

/// Options passed along with an activation change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActivationOptions {
    /// Let other apps resume their audio once this session deactivates.
    pub notify_others_on_deactivation: bool,
}

impl Default for ActivationOptions {
    fn default() -> Self {
        Self {
            notify_others_on_deactivation: true,
        }
    }
}

/// Notification delivered by the platform, in platform order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlatformEvent {
    RouteChanged {
        reason: RouteChangeReason,
        route: RouteSnapshot,
    },
    Interruption {
        began: bool,
    },
}

/// Platform audio-session API.
///
/// Calls may be slow; the core never makes them while holding an internal lock.
pub trait AudioSessionPlatform: Send + Sync {
    /// Apply category, options and mode.
    fn set_category(&self, configuration: &SessionConfiguration) -> Result<(), PlatformError>;

    /// Activate or deactivate the session.
    fn set_active(&self, active: bool, options: ActivationOptions) -> Result<(), PlatformError>;

    /// Outputs currently carrying audio.
    fn current_route(&self) -> RouteSnapshot;

    /// Stream of route-change and interruption notifications.
    ///
    /// Called once, when the route observer is constructed.
    fn events(&self) -> Receiver<PlatformEvent>;
}

/// Reference to the playable asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetRef {
    pub path: PathBuf,
}

impl AssetRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Invoked at most once, on natural end of playback.
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// Platform playback API.
pub trait PlaybackEngine: Send + Sync {
    /// Locate and decode the asset.
    fn load(&self, asset: &AssetRef) -> Result<Box<dyn PlaybackHandle>, PlatformError>;
}

/// One loaded, playable instance of the asset.
pub trait PlaybackHandle: Send {
    /// Begin playback. `on_complete` runs on the engine's thread at natural end,
    /// or before `play` returns when the asset ends immediately; never after
    /// [`PlaybackHandle::stop`].
    fn play(&mut self, on_complete: CompletionCallback) -> Result<(), PlatformError>;

    /// Stop playback without waiting for the engine to wind down.
    fn stop(&mut self);
}
