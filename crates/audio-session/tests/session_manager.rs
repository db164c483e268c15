mod support;

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use audio_session::catalog;
use audio_session::error::{ActivationError, ConfigError, ConfigureError, PlayError, PlaybackError};
use audio_session::platform::{ActivationOptions, PlatformEvent};
use audio_session::route::{RouteChange, RouteListener, RouteObserver};
use audio_session::session::SessionStateMachine;
use audio_session::types::{
    ActivationState, Category, DeactivationReason, OptionFlag, OptionSet, PlaybackEndReason,
    RouteChangeReason, SessionConfiguration,
};

use support::{FakeEngine, FakePlatform, manager, route, wait_until};

#[test]
fn playback_runs_to_completion_and_releases_session() {
    let platform = FakePlatform::new(route(&["Speaker"]));
    let engine = FakeEngine::new();
    let mgr = manager(&platform, &engine);

    mgr.configure(Category::Playback, OptionSet::empty()).unwrap();
    mgr.play().unwrap();
    assert_eq!(mgr.activation_state(), ActivationState::Active);
    assert!(mgr.is_playing());

    engine.finish();

    wait_until(|| mgr.activation_state() == ActivationState::Inactive);
    assert!(!mgr.is_playing());
    let status = mgr.status();
    assert_eq!(status.last_deactivation, Some(DeactivationReason::PlaybackFinished));
    assert_eq!(status.last_playback_end, Some(PlaybackEndReason::Eof));
    assert_eq!(mgr.current_outputs(), vec!["Speaker".to_string()]);
    assert_eq!(platform.activations.load(Ordering::SeqCst), 1);
    assert_eq!(platform.deactivations.load(Ordering::SeqCst), 1);
}

#[test]
fn rejected_configuration_keeps_previous_one() {
    let platform = FakePlatform::new(route(&["Speaker"]));
    let engine = FakeEngine::new();
    let mgr = manager(&platform, &engine);

    let mix: OptionSet = [OptionFlag::MixWithOthers].into();
    mgr.configure(Category::Playback, mix).unwrap();

    let err = mgr
        .configure(Category::PlayAndRecord, [OptionFlag::DefaultToSpeaker].into())
        .unwrap_err();
    assert_eq!(
        err,
        ConfigureError::Config(ConfigError::IncompatibleOptions {
            category: Category::PlayAndRecord,
            offending: [OptionFlag::DefaultToSpeaker].into(),
        })
    );
    assert_eq!(
        mgr.current_configuration(),
        SessionConfiguration::new(Category::Playback, mix)
    );
    assert!(platform.applied.lock().unwrap().is_empty());
}

#[test]
fn configure_either_succeeds_or_changes_nothing() {
    let platform = FakePlatform::new(route(&["Speaker"]));
    let engine = FakeEngine::new();
    let mgr = manager(&platform, &engine);

    for category in catalog::list_categories() {
        for bits in 0u8..(1 << OptionFlag::ALL.len()) {
            let options: OptionSet = OptionFlag::ALL
                .iter()
                .enumerate()
                .filter(|(i, _)| bits & (1 << i) != 0)
                .map(|(_, f)| *f)
                .collect();
            let before = mgr.current_configuration();
            let expected_ok = catalog::incompatible_options(category, options).is_empty();
            match mgr.configure(category, options) {
                Ok(()) => {
                    assert!(expected_ok, "{category} {options} should be rejected");
                    assert_eq!(
                        mgr.current_configuration(),
                        SessionConfiguration::new(category, options)
                    );
                }
                Err(_) => {
                    assert!(!expected_ok, "{category} {options} should be accepted");
                    assert_eq!(mgr.current_configuration(), before);
                }
            }
        }
    }
}

#[test]
fn second_activation_fails_without_corrupting_state() {
    let platform = FakePlatform::new(route(&["Speaker"]));
    let engine = FakeEngine::new();
    let mgr = manager(&platform, &engine);

    mgr.activate().unwrap();
    assert_eq!(
        mgr.activate(),
        Err(ActivationError::NotInactive(ActivationState::Active))
    );
    assert_eq!(mgr.activation_state(), ActivationState::Active);
    assert_eq!(platform.activations.load(Ordering::SeqCst), 1);

    // Playing on an already-active session is fine.
    mgr.play().unwrap();
    assert!(mgr.is_playing());
}

#[test]
fn interruption_stops_playback_and_blocks_activation_until_it_ends() {
    let platform = FakePlatform::new(route(&["Speaker"]));
    let engine = FakeEngine::new();
    let mgr = manager(&platform, &engine);

    mgr.play().unwrap();
    platform.emit(PlatformEvent::Interruption { began: true });
    wait_until(|| mgr.route_observer().processed_events() >= 1);
    wait_until(|| mgr.activation_state() == ActivationState::Inactive && !mgr.is_playing());

    let status = mgr.status();
    assert!(status.interrupted);
    assert_eq!(status.last_deactivation, Some(DeactivationReason::InterruptionBegan));
    assert_eq!(status.last_playback_end, Some(PlaybackEndReason::Stopped));
    assert_eq!(mgr.activate(), Err(ActivationError::Interrupted));

    platform.emit(PlatformEvent::Interruption { began: false });
    wait_until(|| mgr.route_observer().processed_events() >= 2);

    assert!(!mgr.status().interrupted);
    assert!(!mgr.is_playing(), "playback never resumes on its own");
    assert_eq!(mgr.activation_state(), ActivationState::Inactive);
    mgr.activate().unwrap();
}

#[test]
fn lost_route_deactivates_and_stops_playback() {
    let platform = FakePlatform::new(route(&["Headphones"]));
    let engine = FakeEngine::new();
    let mgr = manager(&platform, &engine);

    mgr.play().unwrap();
    platform.emit_route(RouteChangeReason::OldDeviceUnavailable, &["Speaker"]);
    wait_until(|| mgr.route_observer().processed_events() >= 1);
    wait_until(|| mgr.activation_state() == ActivationState::Inactive && !mgr.is_playing());

    assert_eq!(mgr.status().last_deactivation, Some(DeactivationReason::RouteLost));
    assert_eq!(mgr.current_outputs(), vec!["Speaker".to_string()]);
    assert!(engine.stops.load(Ordering::SeqCst) >= 1);
}

#[test]
fn new_device_keeps_playing() {
    let platform = FakePlatform::new(route(&["Speaker"]));
    let engine = FakeEngine::new();
    let mgr = manager(&platform, &engine);

    mgr.play().unwrap();
    platform.emit_route(RouteChangeReason::NewDeviceAvailable, &["Headphones"]);
    wait_until(|| mgr.route_observer().processed_events() >= 1);

    assert_eq!(mgr.activation_state(), ActivationState::Active);
    assert!(mgr.is_playing());
    assert_eq!(mgr.current_outputs(), vec!["Headphones".to_string()]);
}

#[test]
fn slow_release_does_not_hold_up_route_changes() {
    let platform = FakePlatform::new(route(&["Speaker"]));
    let engine = FakeEngine::new();
    let mgr = manager(&platform, &engine);

    mgr.play().unwrap();
    let release = platform.gate_release();
    platform.emit(PlatformEvent::Interruption { began: true });
    platform.emit_route(RouteChangeReason::NewDeviceAvailable, &["Headphones"]);

    wait_until(|| mgr.route_observer().processed_events() == 2);
    assert_eq!(mgr.current_outputs(), vec!["Headphones".to_string()]);
    assert_eq!(mgr.activation_state(), ActivationState::Deactivating);
    assert_eq!(mgr.activate(), Err(ActivationError::NotInactive(ActivationState::Deactivating)));

    release.send(()).unwrap();
    wait_until(|| mgr.activation_state() == ActivationState::Inactive && !mgr.is_playing());
    let status = mgr.status();
    assert_eq!(status.last_deactivation, Some(DeactivationReason::InterruptionBegan));
    assert_eq!(status.last_playback_end, Some(PlaybackEndReason::Stopped));
    assert_eq!(platform.deactivations.load(Ordering::SeqCst), 1);
}

#[test]
fn slow_release_does_not_hold_up_completion() {
    let platform = FakePlatform::new(route(&["Speaker"]));
    let engine = FakeEngine::new();
    let mgr = manager(&platform, &engine);

    mgr.play().unwrap();
    let release = platform.gate_release();
    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    let engine_thread = engine.clone();
    thread::spawn(move || {
        engine_thread.finish();
        let _ = done_tx.send(());
    });

    done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("completion waited on the platform");
    assert_eq!(mgr.activation_state(), ActivationState::Deactivating);
    assert!(!mgr.is_playing());

    release.send(()).unwrap();
    wait_until(|| mgr.activation_state() == ActivationState::Inactive);
    assert_eq!(mgr.status().last_deactivation, Some(DeactivationReason::PlaybackFinished));
}

#[test]
fn configure_during_activation_reaches_the_platform() {
    let platform = FakePlatform::new(route(&["Speaker"]));
    let engine = FakeEngine::new();
    let mgr = manager(&platform, &engine);
    let duck: OptionSet = [OptionFlag::DuckOthers].into();

    let activation = platform.gate_activation();
    thread::scope(|scope| {
        let play = scope.spawn(|| mgr.play());
        wait_until(|| mgr.activation_state() == ActivationState::Activating);

        mgr.configure(Category::Playback, duck).unwrap();
        activation.send(()).unwrap();
        activation.send(()).unwrap();

        assert_eq!(play.join().unwrap(), Ok(()));
    });

    assert_eq!(mgr.activation_state(), ActivationState::Active);
    assert!(mgr.is_playing());
    let expected = SessionConfiguration::new(Category::Playback, duck);
    assert_eq!(mgr.current_configuration(), expected);
    assert_eq!(platform.applied.lock().unwrap().last().copied(), Some(expected));
}

#[test]
fn playback_that_ends_immediately_is_not_a_failure() {
    let platform = FakePlatform::new(route(&["Speaker"]));
    let engine = FakeEngine::new();
    engine.finish_on_play.store(true, Ordering::SeqCst);
    let mgr = manager(&platform, &engine);

    assert_eq!(mgr.play(), Ok(()));

    wait_until(|| mgr.activation_state() == ActivationState::Inactive);
    let status = mgr.status();
    assert!(!status.playing);
    assert_eq!(status.last_deactivation, Some(DeactivationReason::PlaybackFinished));
    assert_eq!(status.last_playback_end, Some(PlaybackEndReason::Eof));
    assert_eq!(platform.deactivations.load(Ordering::SeqCst), 1);
}

#[test]
fn reconfigure_while_active_reapplies_and_keeps_playing() {
    let platform = FakePlatform::new(route(&["Speaker"]));
    let engine = FakeEngine::new();
    let mgr = manager(&platform, &engine);

    mgr.play().unwrap();
    let duck: OptionSet = [OptionFlag::DuckOthers].into();
    mgr.configure(Category::Playback, duck).unwrap();

    assert_eq!(mgr.activation_state(), ActivationState::Active);
    assert!(mgr.is_playing());
    assert_eq!(platform.activations.load(Ordering::SeqCst), 2);
    let applied = platform.applied.lock().unwrap();
    assert_eq!(
        applied.last().copied(),
        Some(SessionConfiguration::new(Category::Playback, duck))
    );
}

#[test]
fn failed_reconfigure_stops_playback() {
    let platform = FakePlatform::new(route(&["Speaker"]));
    let engine = FakeEngine::new();
    let mgr = manager(&platform, &engine);

    mgr.play().unwrap();
    platform.reject_activation.store(true, Ordering::SeqCst);
    let err = mgr.configure(Category::Ambient, OptionSet::empty()).unwrap_err();
    assert_eq!(
        err,
        ConfigureError::Activation(ActivationError::PlatformRejected(0x2170_6c61))
    );
    assert_eq!(mgr.activation_state(), ActivationState::Inactive);
    assert!(!mgr.is_playing());
    assert_eq!(mgr.current_configuration().category, Category::Ambient);
}

#[test]
fn missing_asset_releases_the_session() {
    let platform = FakePlatform::new(route(&["Speaker"]));
    let engine = FakeEngine::new();
    engine.missing.store(true, Ordering::SeqCst);
    let mgr = manager(&platform, &engine);

    let err = mgr.play().unwrap_err();
    assert_eq!(
        err,
        PlayError::Playback(PlaybackError::AssetUnavailable("asset not found".to_string()))
    );
    assert_eq!(mgr.activation_state(), ActivationState::Inactive);
    assert_eq!(mgr.status().last_deactivation, Some(DeactivationReason::PlaybackFailed));
}

#[test]
fn rejected_activation_is_reported() {
    let platform = FakePlatform::new(route(&["Speaker"]));
    let engine = FakeEngine::new();
    platform.reject_activation.store(true, Ordering::SeqCst);
    let mgr = manager(&platform, &engine);

    assert_eq!(
        mgr.play(),
        Err(PlayError::Activation(ActivationError::PlatformRejected(0x2170_6c61)))
    );
    assert_eq!(mgr.activation_state(), ActivationState::Inactive);
    assert_eq!(engine.loads.load(Ordering::SeqCst), 0);
}

#[test]
fn stop_releases_session_and_ignores_late_completion() {
    let platform = FakePlatform::new(route(&["Speaker"]));
    let engine = FakeEngine::new();
    let mgr = manager(&platform, &engine);

    mgr.play().unwrap();
    mgr.stop();
    assert_eq!(mgr.activation_state(), ActivationState::Inactive);
    assert_eq!(mgr.status().last_deactivation, Some(DeactivationReason::UserStop));

    engine.finish();
    assert_eq!(platform.deactivations.load(Ordering::SeqCst), 1);
    assert_eq!(mgr.status().last_playback_end, Some(PlaybackEndReason::Stopped));

    // Stopping again is harmless.
    mgr.stop();
    assert_eq!(platform.deactivations.load(Ordering::SeqCst), 1);
}

#[test]
fn route_changes_are_observed_in_delivery_order() {
    const SENDERS: usize = 4;
    const PER_SENDER: usize = 50;

    let platform = FakePlatform::new(route(&["start"]));
    let session = Arc::new(SessionStateMachine::new(
        platform.clone(),
        ActivationOptions::default(),
    ));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_by_listener = seen.clone();
    let listener: RouteListener = Box::new(move |change: &RouteChange| {
        let mut seen = seen_by_listener.lock().unwrap();
        // Each change must start from the snapshot the previous one produced.
        if let Some(last) = seen.last() {
            assert_eq!(&change.previous.names(), last);
        }
        seen.push(change.current.names());
    });
    let observer = RouteObserver::spawn(platform.as_ref(), session, vec![listener]);

    let senders: Vec<_> = (0..SENDERS)
        .map(|s| {
            let tx = platform.sender();
            thread::spawn(move || {
                for i in 0..PER_SENDER {
                    tx.send(PlatformEvent::RouteChanged {
                        reason: RouteChangeReason::Override,
                        route: route(&[format!("{s}:{i}").as_str()]),
                    })
                    .unwrap();
                }
            })
        })
        .collect();
    for handle in senders {
        handle.join().unwrap();
    }
    wait_until(|| observer.processed_events() == (SENDERS * PER_SENDER) as u64);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), SENDERS * PER_SENDER);

    // Per-sender order survives interleaving.
    let mut next_index: HashMap<usize, usize> = HashMap::new();
    for names in seen.iter() {
        let (sender, index) = names[0].split_once(':').unwrap();
        let sender: usize = sender.parse().unwrap();
        let index: usize = index.parse().unwrap();
        let expected = next_index.entry(sender).or_insert(0);
        assert_eq!(index, *expected);
        *expected += 1;
    }
    assert_eq!(&observer.current_outputs(), seen.last().unwrap());
}
