//! Route observer.
//!
//! Drains the platform notification stream on one dedicated thread so that
//! route changes and interruptions are handled strictly in delivery order, no
//! matter which threads the platform raised them on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use audio_session_types::{RouteChangeReason, RouteSnapshot};
use crossbeam_channel::{Receiver, Sender};

use crate::platform::{AudioSessionPlatform, PlatformEvent};
use crate::session::SessionStateMachine;

/// A route replacement, as seen by listeners.
#[derive(Clone, Debug)]
pub struct RouteChange {
    pub reason: RouteChangeReason,
    pub previous: Arc<RouteSnapshot>,
    pub current: Arc<RouteSnapshot>,
}

/// Runs on the observer thread after each route replacement. Must not block.
pub type RouteListener = Box<dyn Fn(&RouteChange) + Send + 'static>;

pub struct RouteObserver {
    current: Arc<Mutex<Arc<RouteSnapshot>>>,
    processed: Arc<AtomicU64>,
    // Dropping the sender disconnects the channel and ends the observer thread.
    _shutdown: Sender<()>,
}

impl RouteObserver {
    /// Subscribe to `platform` and start the observer thread.
    ///
    /// The initial snapshot is the platform's current route. Listeners are fixed
    /// for the observer's lifetime.
    pub fn spawn(
        platform: &dyn AudioSessionPlatform,
        session: Arc<SessionStateMachine>,
        listeners: Vec<RouteListener>,
    ) -> Self {
        let events = platform.events();
        let current = Arc::new(Mutex::new(Arc::new(platform.current_route())));
        let processed = Arc::new(AtomicU64::new(0));
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);

        let worker = ObserverWorker {
            current: current.clone(),
            processed: processed.clone(),
            session,
            listeners,
        };
        thread::spawn(move || worker.run(events, shutdown_rx));

        Self {
            current,
            processed,
            _shutdown: shutdown_tx,
        }
    }

    /// Current route snapshot.
    pub fn current(&self) -> Arc<RouteSnapshot> {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Output port names of the current route.
    pub fn current_outputs(&self) -> Vec<String> {
        self.current().names()
    }

    /// Number of platform events handled so far.
    pub fn processed_events(&self) -> u64 {
        self.processed.load(Ordering::Acquire)
    }
}

struct ObserverWorker {
    current: Arc<Mutex<Arc<RouteSnapshot>>>,
    processed: Arc<AtomicU64>,
    session: Arc<SessionStateMachine>,
    listeners: Vec<RouteListener>,
}

impl ObserverWorker {
    fn run(self, events: Receiver<PlatformEvent>, shutdown: Receiver<()>) {
        tracing::debug!("route observer started");
        loop {
            crossbeam_channel::select! {
                recv(events) -> msg => match msg {
                    Ok(event) => self.handle(event),
                    Err(_) => break,
                },
                recv(shutdown) -> _ => break,
            }
        }
        tracing::debug!("route observer stopped");
    }

    fn handle(&self, event: PlatformEvent) {
        match event {
            PlatformEvent::RouteChanged { reason, route } => {
                let current = Arc::new(route);
                let previous = {
                    let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
                    std::mem::replace(&mut *guard, current.clone())
                };
                tracing::info!(
                    reason = ?reason,
                    outputs = ?current.names(),
                    "route changed"
                );
                let change = RouteChange {
                    reason,
                    previous,
                    current,
                };
                for listener in &self.listeners {
                    listener(&change);
                }
            }
            PlatformEvent::Interruption { began } => {
                self.session.on_interruption(began);
            }
        }
        self.processed.fetch_add(1, Ordering::Release);
    }
}
