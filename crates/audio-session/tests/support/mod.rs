//! In-memory platform and engine doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use audio_session::error::PlatformError;
use audio_session::platform::{
    ActivationOptions, AssetRef, AudioSessionPlatform, CompletionCallback, PlatformEvent,
    PlaybackEngine, PlaybackHandle,
};
use audio_session::types::{OutputPort, PortKind, RouteChangeReason, RouteSnapshot, SessionConfiguration};
use audio_session::{SessionManager, SessionManagerConfig};
use crossbeam_channel::{Receiver, Sender};

pub fn route(names: &[&str]) -> RouteSnapshot {
    RouteSnapshot::new(
        names
            .iter()
            .map(|n| OutputPort::new(*n, PortKind::Other))
            .collect(),
    )
}

/// Platform double. Events are pushed by tests through [`FakePlatform::emit`].
pub struct FakePlatform {
    pub initial: RouteSnapshot,
    pub applied: Mutex<Vec<SessionConfiguration>>,
    pub activations: AtomicUsize,
    pub deactivations: AtomicUsize,
    pub reject_activation: AtomicBool,
    activation_gate: Mutex<Option<Receiver<()>>>,
    release_gate: Mutex<Option<Receiver<()>>>,
    events_tx: Sender<PlatformEvent>,
    events_rx: Receiver<PlatformEvent>,
}

impl FakePlatform {
    pub fn new(initial: RouteSnapshot) -> Arc<Self> {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Arc::new(Self {
            initial,
            applied: Mutex::new(Vec::new()),
            activations: AtomicUsize::new(0),
            deactivations: AtomicUsize::new(0),
            reject_activation: AtomicBool::new(false),
            activation_gate: Mutex::new(None),
            release_gate: Mutex::new(None),
            events_tx,
            events_rx,
        })
    }

    pub fn emit(&self, event: PlatformEvent) {
        self.events_tx.send(event).unwrap();
    }

    pub fn emit_route(&self, reason: RouteChangeReason, names: &[&str]) {
        self.emit(PlatformEvent::RouteChanged {
            reason,
            route: route(names),
        });
    }

    pub fn sender(&self) -> Sender<PlatformEvent> {
        self.events_tx.clone()
    }

    /// Hold every later `set_active(true)` until the returned sender sends once per call.
    pub fn gate_activation(&self) -> Sender<()> {
        let (tx, rx) = crossbeam_channel::unbounded();
        *self.activation_gate.lock().unwrap() = Some(rx);
        tx
    }

    /// Hold every later `set_active(false)` until the returned sender sends once per call.
    pub fn gate_release(&self) -> Sender<()> {
        let (tx, rx) = crossbeam_channel::unbounded();
        *self.release_gate.lock().unwrap() = Some(rx);
        tx
    }
}

impl AudioSessionPlatform for FakePlatform {
    fn set_category(&self, configuration: &SessionConfiguration) -> Result<(), PlatformError> {
        self.applied.lock().unwrap().push(*configuration);
        Ok(())
    }

    fn set_active(&self, active: bool, _options: ActivationOptions) -> Result<(), PlatformError> {
        let gate = if active {
            self.activation_gate.lock().unwrap().clone()
        } else {
            self.release_gate.lock().unwrap().clone()
        };
        if let Some(gate) = gate {
            let _ = gate.recv();
        }
        if active {
            if self.reject_activation.load(Ordering::SeqCst) {
                return Err(PlatformError::new(0x2170_6c61, "no output device"));
            }
            self.activations.fetch_add(1, Ordering::SeqCst);
        } else {
            self.deactivations.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn current_route(&self) -> RouteSnapshot {
        self.initial.clone()
    }

    fn events(&self) -> Receiver<PlatformEvent> {
        self.events_rx.clone()
    }
}

/// Engine double. Playback ends when a test calls [`FakeEngine::finish`], or
/// inside `play` when `finish_on_play` is set.
#[derive(Default)]
pub struct FakeEngine {
    pub missing: AtomicBool,
    pub finish_on_play: AtomicBool,
    pub loads: AtomicUsize,
    pub stops: Arc<AtomicUsize>,
    pending: Arc<Mutex<Vec<CompletionCallback>>>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Simulate the asset reaching its natural end, on another thread.
    pub fn finish(&self) {
        let callbacks: Vec<_> = self.pending.lock().unwrap().drain(..).collect();
        std::thread::spawn(move || {
            for cb in callbacks {
                cb();
            }
        })
        .join()
        .unwrap();
    }
}

struct FakeHandle {
    finish_on_play: bool,
    pending: Arc<Mutex<Vec<CompletionCallback>>>,
    stops: Arc<AtomicUsize>,
}

impl PlaybackEngine for FakeEngine {
    fn load(&self, _asset: &AssetRef) -> Result<Box<dyn PlaybackHandle>, PlatformError> {
        if self.missing.load(Ordering::SeqCst) {
            return Err(PlatformError::new(2, "asset not found"));
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeHandle {
            finish_on_play: self.finish_on_play.load(Ordering::SeqCst),
            pending: self.pending.clone(),
            stops: self.stops.clone(),
        }))
    }
}

impl PlaybackHandle for FakeHandle {
    fn play(&mut self, on_complete: CompletionCallback) -> Result<(), PlatformError> {
        if self.finish_on_play {
            on_complete();
            return Ok(());
        }
        self.pending.lock().unwrap().push(on_complete);
        Ok(())
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn manager(platform: &Arc<FakePlatform>, engine: &Arc<FakeEngine>) -> SessionManager {
    SessionManager::new(
        platform.clone(),
        engine.clone(),
        &SessionManagerConfig::default(),
    )
}

/// Poll `cond` until it holds or five seconds pass.
pub fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not met in time");
        std::thread::sleep(Duration::from_millis(1));
    }
}
