//! Playback controller.
//!
//! Owns the single playable asset and at most one live [`PlaybackHandle`].
//! Each `start` creates a new handle tagged with a generation number; completion
//! callbacks and late installs from older generations are ignored, so natural
//! completion deactivates the session at most once per handle.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use audio_session_types::{ActivationState, DeactivationReason, PlaybackEndReason};

use crate::error::{DeactivationError, PlaybackError};
use crate::platform::{AssetRef, CompletionCallback, PlaybackEngine, PlaybackHandle};
use crate::session::SessionStateMachine;

/// Where a freshly started handle ended up.
enum Install {
    Current,
    /// Reached its end inside `play`; completion already ran.
    Finished,
    Superseded(Box<dyn PlaybackHandle>),
}

#[derive(Default)]
struct PlaybackInner {
    generation: u64,
    handle: Option<Box<dyn PlaybackHandle>>,
    completed_generation: Option<u64>,
    last_end: Option<PlaybackEndReason>,
}

pub struct PlaybackController {
    engine: Arc<dyn PlaybackEngine>,
    session: Arc<SessionStateMachine>,
    asset: AssetRef,
    inner: Arc<Mutex<PlaybackInner>>,
}

impl PlaybackController {
    pub fn new(
        engine: Arc<dyn PlaybackEngine>,
        session: Arc<SessionStateMachine>,
        asset: AssetRef,
    ) -> Self {
        Self {
            engine,
            session,
            asset,
            inner: Arc::new(Mutex::new(PlaybackInner::default())),
        }
    }

    /// Load the asset and start playing it, replacing any current playback.
    ///
    /// Requires an active session.
    pub fn start(&self) -> Result<(), PlaybackError> {
        if self.session.state() != ActivationState::Active {
            return Err(PlaybackError::NotActive);
        }

        let mut handle = self.engine.load(&self.asset).map_err(|e| {
            tracing::warn!(asset = ?self.asset.path, code = e.code, "asset unavailable: {e}");
            PlaybackError::AssetUnavailable(e.message)
        })?;

        let (generation, previous) = {
            let mut inner = self.lock();
            inner.generation += 1;
            (inner.generation, inner.handle.take())
        };
        if let Some(mut previous) = previous {
            tracing::debug!("replacing current playback");
            previous.stop();
        }

        if let Err(e) = handle.play(self.completion_callback(generation)) {
            tracing::warn!(code = e.code, "playback engine refused to start: {e}");
            self.lock().last_end = Some(PlaybackEndReason::Error);
            return Err(PlaybackError::StartFailed(e.code));
        }

        let install = {
            let mut inner = self.lock();
            if inner.generation == generation {
                inner.handle = Some(handle);
                inner.last_end = None;
                Install::Current
            } else if inner.completed_generation == Some(generation) {
                Install::Finished
            } else {
                Install::Superseded(handle)
            }
        };
        match install {
            Install::Current => {}
            Install::Finished => {
                tracing::info!(asset = ?self.asset.path, "playback finished while starting");
                return Ok(());
            }
            Install::Superseded(mut handle) => {
                tracing::debug!("playback stopped while starting");
                handle.stop();
            }
        }

        if self.session.state() != ActivationState::Active {
            self.stop();
            return Err(PlaybackError::NotActive);
        }
        tracing::info!(asset = ?self.asset.path, "playback started");
        Ok(())
    }

    /// Stop playback. No-op when nothing is playing.
    pub fn stop(&self) {
        let handle = {
            let mut inner = self.lock();
            inner.generation += 1;
            let handle = inner.handle.take();
            if handle.is_some() {
                inner.last_end = Some(PlaybackEndReason::Stopped);
            }
            handle
        };
        if let Some(mut handle) = handle {
            handle.stop();
            tracing::info!("playback stopped");
        }
    }

    pub fn is_playing(&self) -> bool {
        self.lock().handle.is_some()
    }

    /// Why the most recent playback ended; `None` while playing or before the first run.
    pub fn last_end(&self) -> Option<PlaybackEndReason> {
        self.lock().last_end
    }

    fn completion_callback(&self, generation: u64) -> CompletionCallback {
        let inner = Arc::downgrade(&self.inner);
        let session = Arc::downgrade(&self.session);
        Box::new(move || on_playback_complete(inner, session, generation))
    }

    fn lock(&self) -> MutexGuard<'_, PlaybackInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Natural end of one handle's playback. Runs on the engine's thread, or inside
/// `play` for engines that finish synchronously, and never waits on the platform.
fn on_playback_complete(
    inner: Weak<Mutex<PlaybackInner>>,
    session: Weak<SessionStateMachine>,
    generation: u64,
) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let finished = {
        let mut guard = inner.lock().unwrap_or_else(|e| e.into_inner());
        if guard.generation != generation {
            None
        } else {
            guard.generation += 1;
            guard.completed_generation = Some(generation);
            guard.last_end = Some(PlaybackEndReason::Eof);
            Some(guard.handle.take())
        }
    };
    let Some(handle) = finished else {
        tracing::debug!(generation, "ignoring completion of superseded playback");
        return;
    };
    drop(handle);
    tracing::info!(generation, "playback finished");

    let Some(session) = session.upgrade() else {
        return;
    };
    if let Err(DeactivationError::NotActive(state)) =
        session.request_deactivation(DeactivationReason::PlaybackFinished)
    {
        tracing::debug!(state = %state, "session already left active state at playback end");
    }
}
