//! Session manager facade.
//!
//! Composition root wiring the state machine, route observer and playback
//! controller together. UIs and harnesses only talk to [`SessionManager`].

use std::sync::Arc;

use audio_session_types::{
    ActivationState, Category, DeactivationReason, OptionSet, SessionConfiguration, SessionMode,
    SessionStatus,
};

use crate::config::SessionManagerConfig;
use crate::error::{ActivationError, ConfigureError, DeactivationError, PlayError};
use crate::platform::{ActivationOptions, AssetRef, AudioSessionPlatform, PlaybackEngine};
use crate::playback::PlaybackController;
use crate::route::{RouteChange, RouteListener, RouteObserver};
use crate::session::SessionStateMachine;

pub struct SessionManager {
    session: Arc<SessionStateMachine>,
    playback: Arc<PlaybackController>,
    observer: RouteObserver,
}

impl SessionManager {
    /// Wire a manager around the given platform collaborators.
    ///
    /// Forced deactivations (interruption, lost route, natural end) stop playback;
    /// losing the output device while active deactivates the session.
    pub fn new(
        platform: Arc<dyn AudioSessionPlatform>,
        engine: Arc<dyn PlaybackEngine>,
        config: &SessionManagerConfig,
    ) -> Self {
        let activation_options = ActivationOptions {
            notify_others_on_deactivation: config.notify_others_on_deactivation,
        };
        let session = Arc::new(SessionStateMachine::new(
            platform.clone(),
            activation_options,
        ));
        let playback = Arc::new(PlaybackController::new(
            engine,
            session.clone(),
            AssetRef::new(&config.asset),
        ));

        let playback_for_listener = Arc::downgrade(&playback);
        session.set_deactivation_listener(Arc::new(move |reason| {
            if let Some(playback) = playback_for_listener.upgrade() {
                tracing::debug!(reason = %reason, "stopping playback after deactivation");
                playback.stop();
            }
        }));

        let session_for_route = session.clone();
        let route_listener: RouteListener = Box::new(move |change: &RouteChange| {
            deactivate_on_lost_route(&session_for_route, change);
        });
        let observer = RouteObserver::spawn(platform.as_ref(), session.clone(), vec![route_listener]);

        Self {
            session,
            playback,
            observer,
        }
    }

    /// Validate and store a configuration; re-apply it if the session is active.
    ///
    /// A rejected configuration leaves the previous one in place. If re-applying
    /// fails, playback is stopped and the session is left inactive.
    pub fn configure(&self, category: Category, options: OptionSet) -> Result<(), ConfigureError> {
        self.session.configure(category, options)?;
        self.apply_if_active()
    }

    pub fn configure_with_mode(
        &self,
        category: Category,
        options: OptionSet,
        mode: SessionMode,
    ) -> Result<(), ConfigureError> {
        self.session.configure_with_mode(category, options, mode)?;
        self.apply_if_active()
    }

    /// Activate the session without starting playback.
    pub fn activate(&self) -> Result<(), ActivationError> {
        self.session.activate()
    }

    /// Play the asset, activating the session first when it is inactive.
    pub fn play(&self) -> Result<(), PlayError> {
        let activated_here = match self.session.activate() {
            Ok(()) => true,
            Err(ActivationError::NotInactive(ActivationState::Active)) => false,
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = self.playback.start() {
            if activated_here {
                match self.session.deactivate(DeactivationReason::PlaybackFailed) {
                    Ok(()) | Err(DeactivationError::PlatformRejected(_)) => {}
                    Err(DeactivationError::NotActive(state)) => {
                        tracing::debug!(state = %state, "session already inactive after failed start");
                    }
                }
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Stop playback and release the session.
    pub fn stop(&self) {
        self.playback.stop();
        match self.session.deactivate(DeactivationReason::UserStop) {
            Ok(()) | Err(DeactivationError::PlatformRejected(_)) => {}
            Err(DeactivationError::NotActive(state)) => {
                tracing::debug!(state = %state, "stop with no active session");
            }
        }
    }

    /// Names of the outputs currently carrying audio.
    pub fn current_outputs(&self) -> Vec<String> {
        self.observer.current_outputs()
    }

    pub fn current_configuration(&self) -> SessionConfiguration {
        self.session.configuration()
    }

    pub fn activation_state(&self) -> ActivationState {
        self.session.state()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    pub fn status(&self) -> SessionStatus {
        let snap = self.session.snapshot();
        SessionStatus {
            configuration: snap.configuration,
            state: snap.state,
            interrupted: snap.interrupted,
            last_deactivation: snap.last_deactivation,
            outputs: self.current_outputs(),
            playing: self.playback.is_playing(),
            last_playback_end: self.playback.last_end(),
        }
    }

    pub fn session(&self) -> &Arc<SessionStateMachine> {
        &self.session
    }

    pub fn route_observer(&self) -> &RouteObserver {
        &self.observer
    }

    fn apply_if_active(&self) -> Result<(), ConfigureError> {
        match self.session.reactivate() {
            Ok(()) => Ok(()),
            // Activating: the in-flight activation applies the stored
            // configuration before settling. Otherwise it waits for the next one.
            Err(ActivationError::NotActive(_)) => Ok(()),
            Err(e) => {
                self.playback.stop();
                Err(e.into())
            }
        }
    }
}

fn deactivate_on_lost_route(session: &SessionStateMachine, change: &RouteChange) {
    if !change.reason.loses_route() || session.state() != ActivationState::Active {
        return;
    }
    tracing::info!(
        reason = ?change.reason,
        previous = ?change.previous.names(),
        "output route lost"
    );
    // Runs on the observer thread; the platform call happens on the teardown worker.
    if let Err(DeactivationError::NotActive(state)) =
        session.request_deactivation(DeactivationReason::RouteLost)
    {
        tracing::debug!(state = %state, "session left active state before route loss");
    }
}
