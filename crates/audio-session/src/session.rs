//! Session state machine.
//!
//! Owns the session configuration and activation state. Every transition is
//! decided under one mutex; platform calls happen after the lock is released,
//! with the transient `Activating` / `Deactivating` states making the in-flight
//! call visible to concurrent requests, which are rejected rather than queued.
//! A configuration stored while an activation is in flight is applied before
//! that activation settles.
//!
//! Forced deactivations (interruption, lost route, natural end) are raised on
//! the route observer and engine threads. Those only flip the state to
//! `Deactivating`; the platform call runs on a teardown worker so a slow
//! platform never stalls the thread that raised them.
//!
//! ```text
//! Inactive -> Activating -> Active -> Deactivating -> Inactive
//!                 ^            |
//!                 +------------+  (reactivate)
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use audio_session_types::{
    ActivationState, Category, DeactivationReason, OptionSet, SessionConfiguration, SessionMode,
};
use crossbeam_channel::{Receiver, SendError, Sender};

use crate::catalog;
use crate::error::{ActivationError, ConfigError, DeactivationError, PlatformError};
use crate::platform::{ActivationOptions, AudioSessionPlatform};

/// Called with the reason each time an active session settles to `Inactive`.
pub type DeactivationListener = Arc<dyn Fn(DeactivationReason) + Send + Sync>;

/// Immutable copy of the state machine's state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub configuration: SessionConfiguration,
    pub state: ActivationState,
    pub interrupted: bool,
    pub last_deactivation: Option<DeactivationReason>,
}

struct Inner {
    configuration: SessionConfiguration,
    state: ActivationState,
    interrupted: bool,
    last_deactivation: Option<DeactivationReason>,
}

/// State shared with the teardown worker.
struct Shared {
    inner: Mutex<Inner>,
    listener: Mutex<Option<DeactivationListener>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn settle_inactive(&self, reason: DeactivationReason) {
        {
            let mut inner = self.lock();
            inner.state = ActivationState::Inactive;
            inner.last_deactivation = Some(reason);
        }
        tracing::info!(reason = %reason, "audio session inactive");
        self.notify_deactivated(reason);
    }

    fn notify_deactivated(&self, reason: DeactivationReason) {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(listener) = listener {
            listener(reason);
        }
    }
}

/// A deactivation already committed to `Deactivating`, waiting for the platform call.
struct Teardown {
    reason: DeactivationReason,
}

struct TeardownWorker {
    platform: Arc<dyn AudioSessionPlatform>,
    activation_options: ActivationOptions,
    shared: Arc<Shared>,
}

impl TeardownWorker {
    fn run(self, rx: Receiver<Teardown>) {
        while let Ok(Teardown { reason }) = rx.recv() {
            if let Err(e) = self.platform.set_active(false, self.activation_options) {
                tracing::warn!(code = e.code, reason = %reason, "failed to deactivate audio session: {e}");
            }
            self.shared.settle_inactive(reason);
        }
        tracing::debug!("session teardown worker stopped");
    }
}

/// How an activation settles once the platform accepted it.
enum Settle {
    Active,
    Reapply(SessionConfiguration),
    RollBack,
}

pub struct SessionStateMachine {
    platform: Arc<dyn AudioSessionPlatform>,
    activation_options: ActivationOptions,
    shared: Arc<Shared>,
    // Dropping the sender ends the teardown worker after queued work is done.
    teardown: Sender<Teardown>,
}

impl SessionStateMachine {
    /// Start `Inactive` with the default configuration (plain playback).
    pub fn new(platform: Arc<dyn AudioSessionPlatform>, activation_options: ActivationOptions) -> Self {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                configuration: SessionConfiguration::default(),
                state: ActivationState::Inactive,
                interrupted: false,
                last_deactivation: None,
            }),
            listener: Mutex::new(None),
        });

        let (teardown, teardown_rx) = crossbeam_channel::unbounded();
        let worker = TeardownWorker {
            platform: platform.clone(),
            activation_options,
            shared: shared.clone(),
        };
        thread::spawn(move || worker.run(teardown_rx));

        Self {
            platform,
            activation_options,
            shared,
            teardown,
        }
    }

    /// Replace the deactivation listener.
    ///
    /// The listener runs on whichever thread settles the session: the caller of
    /// [`deactivate`](Self::deactivate) or the teardown worker.
    pub fn set_deactivation_listener(&self, listener: DeactivationListener) {
        *self.shared.listener.lock().unwrap_or_else(|e| e.into_inner()) = Some(listener);
    }

    pub fn state(&self) -> ActivationState {
        self.lock().state
    }

    pub fn configuration(&self) -> SessionConfiguration {
        self.lock().configuration
    }

    pub fn is_interrupted(&self) -> bool {
        self.lock().interrupted
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        SessionSnapshot {
            configuration: inner.configuration,
            state: inner.state,
            interrupted: inner.interrupted,
            last_deactivation: inner.last_deactivation,
        }
    }

    /// Validate and store a new category and option set, keeping the current mode.
    ///
    /// Does not touch the platform; the configuration is applied by an
    /// activation already in flight, or else by the next activation or
    /// reactivation. On error nothing changes.
    pub fn configure(&self, category: Category, options: OptionSet) -> Result<(), ConfigError> {
        let mode = self.lock().configuration.mode;
        self.configure_with_mode(category, options, mode)
    }

    pub fn configure_with_mode(
        &self,
        category: Category,
        options: OptionSet,
        mode: SessionMode,
    ) -> Result<(), ConfigError> {
        let offending = catalog::incompatible_options(category, options);
        if !offending.is_empty() {
            tracing::warn!(
                category = %category,
                options = %options,
                offending = %offending,
                "configuration rejected"
            );
            return Err(ConfigError::IncompatibleOptions {
                category,
                offending,
            });
        }
        let configuration = SessionConfiguration {
            category,
            options,
            mode,
        };
        let mut inner = self.lock();
        inner.configuration = configuration;
        tracing::info!(
            category = %category,
            options = %options,
            mode = %mode,
            state = %inner.state,
            "session configured"
        );
        Ok(())
    }

    /// Activate the session with the stored configuration.
    ///
    /// Legal only from `Inactive` and while no interruption is in progress.
    pub fn activate(&self) -> Result<(), ActivationError> {
        let configuration = {
            let mut inner = self.lock();
            if inner.state != ActivationState::Inactive {
                return Err(ActivationError::NotInactive(inner.state));
            }
            if inner.interrupted {
                return Err(ActivationError::Interrupted);
            }
            inner.state = ActivationState::Activating;
            inner.configuration
        };

        tracing::info!(
            category = %configuration.category,
            options = %configuration.options,
            mode = %configuration.mode,
            "activating audio session"
        );
        self.run_activation(configuration, false)
    }

    /// Re-apply the stored configuration to an active session.
    ///
    /// Internally a deactivate-then-activate; callers observe one transition that
    /// ends `Active` on success and `Inactive` on failure.
    pub fn reactivate(&self) -> Result<(), ActivationError> {
        let configuration = {
            let mut inner = self.lock();
            if inner.state != ActivationState::Active {
                return Err(ActivationError::NotActive(inner.state));
            }
            inner.state = ActivationState::Activating;
            inner.configuration
        };

        tracing::info!(
            category = %configuration.category,
            options = %configuration.options,
            mode = %configuration.mode,
            "reactivating audio session"
        );
        if let Err(e) = self.platform.set_active(false, self.activation_options) {
            tracing::warn!(code = e.code, "deactivation before reconfigure failed: {e}");
        }
        self.run_activation(configuration, true)
    }

    /// Deactivate an active session, waiting for the platform.
    ///
    /// Best-effort: a platform failure is reported, but the state machine has
    /// settled to `Inactive` either way.
    pub fn deactivate(&self, reason: DeactivationReason) -> Result<(), DeactivationError> {
        self.begin_deactivation()?;

        tracing::info!(reason = %reason, "deactivating audio session");
        let result = self.platform.set_active(false, self.activation_options);
        self.shared.settle_inactive(reason);

        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(code = e.code, reason = %reason, "failed to deactivate audio session: {e}");
                Err(DeactivationError::PlatformRejected(e.code))
            }
        }
    }

    /// Deactivate an active session without waiting for the platform.
    ///
    /// The session is `Deactivating` when this returns; the platform call and
    /// the settle to `Inactive` happen on the teardown worker. Platform failures
    /// are logged there.
    pub fn request_deactivation(&self, reason: DeactivationReason) -> Result<(), DeactivationError> {
        self.begin_deactivation()?;

        tracing::info!(reason = %reason, "deactivation requested");
        if let Err(SendError(Teardown { reason })) = self.teardown.send(Teardown { reason }) {
            tracing::warn!(reason = %reason, "teardown worker gone; deactivating inline");
            if let Err(e) = self.platform.set_active(false, self.activation_options) {
                tracing::warn!(code = e.code, reason = %reason, "failed to deactivate audio session: {e}");
            }
            self.shared.settle_inactive(reason);
        }
        Ok(())
    }

    /// React to an interruption notification.
    ///
    /// `began == true` starts deactivating an active session and returns without
    /// waiting for the platform; `began == false` only makes activation legal
    /// again. Playback is never resumed here.
    pub fn on_interruption(&self, began: bool) {
        if !began {
            self.lock().interrupted = false;
            tracing::info!("interruption ended");
            return;
        }

        let was_active = {
            let mut inner = self.lock();
            inner.interrupted = true;
            inner.state == ActivationState::Active
        };
        tracing::info!(was_active, "interruption began");
        if !was_active {
            return;
        }
        if let Err(DeactivationError::NotActive(state)) =
            self.request_deactivation(DeactivationReason::InterruptionBegan)
        {
            tracing::debug!(state = %state, "session left active state before interruption");
        }
    }

    fn begin_deactivation(&self) -> Result<(), DeactivationError> {
        let mut inner = self.lock();
        if inner.state != ActivationState::Active {
            return Err(DeactivationError::NotActive(inner.state));
        }
        inner.state = ActivationState::Deactivating;
        Ok(())
    }

    fn apply_and_activate(&self, configuration: &SessionConfiguration) -> Result<(), PlatformError> {
        self.platform.set_category(configuration)?;
        self.platform.set_active(true, self.activation_options)
    }

    /// Drive an `Activating` session to its settled state.
    ///
    /// A rejected activation settles `Inactive` without notifying the listener;
    /// callers of `reactivate` own the cleanup of whatever depended on the session.
    /// If the stored configuration changed while the platform call was in flight,
    /// the new one is applied before settling `Active`.
    fn run_activation(
        &self,
        mut configuration: SessionConfiguration,
        reactivation: bool,
    ) -> Result<(), ActivationError> {
        let mut platform_active = false;
        loop {
            if let Err(e) = self.apply_and_activate(&configuration) {
                if platform_active {
                    let released = self.platform.set_active(false, self.activation_options);
                    if let Err(e) = released {
                        tracing::warn!(code = e.code, "release after failed re-apply failed: {e}");
                    }
                }
                self.lock().state = ActivationState::Inactive;
                tracing::warn!(code = e.code, reactivation, "audio session activation rejected: {e}");
                return Err(ActivationError::PlatformRejected(e.code));
            }
            platform_active = true;

            let settle = {
                let mut inner = self.lock();
                if inner.interrupted {
                    inner.state = ActivationState::Deactivating;
                    Settle::RollBack
                } else if inner.configuration != configuration {
                    Settle::Reapply(inner.configuration)
                } else {
                    inner.state = ActivationState::Active;
                    Settle::Active
                }
            };

            match settle {
                Settle::Active => {
                    tracing::info!("audio session active");
                    return Ok(());
                }
                Settle::Reapply(next) => {
                    tracing::info!(
                        category = %next.category,
                        options = %next.options,
                        mode = %next.mode,
                        "configuration changed during activation; applying"
                    );
                    configuration = next;
                }
                Settle::RollBack => {
                    tracing::info!("interruption began during activation; rolling back");
                    if let Err(e) = self.platform.set_active(false, self.activation_options) {
                        tracing::warn!(code = e.code, "rollback deactivation failed: {e}");
                    }
                    self.shared.settle_inactive(DeactivationReason::InterruptionBegan);
                    return Err(ActivationError::Interrupted);
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared.lock()
    }
}
