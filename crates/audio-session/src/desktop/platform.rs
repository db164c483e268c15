//! Desktop session platform over CPAL.
//!
//! Desktops have no session API, so this keeps the configuration locally and
//! treats "activation" as a check that the devices the category needs exist.
//! Route changes come from a poller thread that watches the default output
//! device; interruptions are injected by the host application.

use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use audio_session_types::{RouteChangeReason, RouteSnapshot, SessionConfiguration};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use super::device;
use crate::config::PlaybackConfig;
use crate::error::PlatformError;
use crate::platform::{ActivationOptions, AudioSessionPlatform, PlatformEvent};

/// `'!pla'`: no output device to play through.
pub const CANNOT_START_PLAYING: i32 = 0x2170_6c61;
/// `'!rec'`: no input device to record from.
pub const CANNOT_START_RECORDING: i32 = 0x2172_6563;

pub struct CpalSessionPlatform {
    device: Option<String>,
    configuration: Mutex<SessionConfiguration>,
    events_tx: Sender<PlatformEvent>,
    events_rx: Receiver<PlatformEvent>,
    // Dropping the sender stops the poller thread.
    _poll_shutdown: Sender<()>,
}

impl CpalSessionPlatform {
    /// Create the platform and start the route poller.
    pub fn new(config: &PlaybackConfig) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);

        let poller = RoutePoller {
            device: config.device.clone(),
            interval: Duration::from_millis(config.route_poll_ms.max(10)),
            events: events_tx.clone(),
        };
        thread::spawn(move || poller.run(shutdown_rx));

        Self {
            device: config.device.clone(),
            configuration: Mutex::new(SessionConfiguration::default()),
            events_tx,
            events_rx,
            _poll_shutdown: shutdown_tx,
        }
    }

    /// Simulate another application taking the audio hardware.
    pub fn begin_interruption(&self) {
        tracing::info!("interruption began");
        let _ = self.events_tx.send(PlatformEvent::Interruption { began: true });
    }

    /// Simulate the other application releasing the audio hardware.
    pub fn end_interruption(&self) {
        tracing::info!("interruption ended");
        let _ = self.events_tx.send(PlatformEvent::Interruption { began: false });
    }
}

impl AudioSessionPlatform for CpalSessionPlatform {
    fn set_category(&self, configuration: &SessionConfiguration) -> Result<(), PlatformError> {
        tracing::debug!(
            category = %configuration.category,
            options = %configuration.options,
            mode = ?configuration.mode,
            "applying session category"
        );
        *self.configuration.lock().unwrap_or_else(|e| e.into_inner()) = *configuration;
        Ok(())
    }

    fn set_active(&self, active: bool, options: ActivationOptions) -> Result<(), PlatformError> {
        if !active {
            tracing::debug!(
                notify_others = options.notify_others_on_deactivation,
                "session released"
            );
            return Ok(());
        }

        let category = self
            .configuration
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .category;
        let host = cpal::default_host();
        if category.plays_audio() {
            device::pick_device(&host, self.device.as_deref()).map_err(|e| {
                PlatformError::new(CANNOT_START_PLAYING, format!("{e:#}"))
            })?;
        }
        if category.records_audio() && !device::has_input_device(&host) {
            return Err(PlatformError::new(
                CANNOT_START_RECORDING,
                "No default input device",
            ));
        }

        Ok(())
    }

    fn current_route(&self) -> RouteSnapshot {
        device::current_route(&cpal::default_host(), self.device.as_deref())
    }

    fn events(&self) -> Receiver<PlatformEvent> {
        self.events_rx.clone()
    }
}

/// What the poller saw on one pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct DeviceScan {
    /// The device carrying audio, if any.
    selected: Option<String>,
    devices: Vec<String>,
}

struct RoutePoller {
    device: Option<String>,
    interval: Duration,
    events: Sender<PlatformEvent>,
}

impl RoutePoller {
    fn run(self, shutdown: Receiver<()>) {
        let mut last = self.scan();
        loop {
            match shutdown.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => {}
                _ => break,
            }
            let next = self.scan();
            if let Some(reason) = classify_route_change(&last, &next) {
                let route = device::current_route(&cpal::default_host(), self.device.as_deref());
                if self
                    .events
                    .send(PlatformEvent::RouteChanged { reason, route })
                    .is_err()
                {
                    break;
                }
            }
            last = next;
        }
        tracing::debug!("route poller stopped");
    }

    fn scan(&self) -> DeviceScan {
        let host = cpal::default_host();
        let selected = device::current_route(&host, self.device.as_deref())
            .primary_name()
            .map(str::to_string);
        DeviceScan {
            selected,
            devices: device::output_device_names(&host),
        }
    }
}

/// Reason for moving from `prev` to `next`, or `None` when the route is unchanged.
///
/// Devices appearing or vanishing without moving the route are not route changes.
fn classify_route_change(prev: &DeviceScan, next: &DeviceScan) -> Option<RouteChangeReason> {
    if prev.selected == next.selected {
        return None;
    }
    let reason = match (&prev.selected, &next.selected) {
        (Some(old), _) if !next.devices.contains(old) => RouteChangeReason::OldDeviceUnavailable,
        (_, None) => RouteChangeReason::NoSuitableRouteForCategory,
        (_, Some(new)) if !prev.devices.contains(new) => RouteChangeReason::NewDeviceAvailable,
        _ => RouteChangeReason::Override,
    };
    Some(reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    use audio_session_types::{Category, OptionFlag, SessionMode};

    /// Platform with no route poller, so tests never scan real devices.
    fn detached_platform() -> CpalSessionPlatform {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let (poll_shutdown, _) = crossbeam_channel::bounded(0);
        CpalSessionPlatform {
            device: None,
            configuration: Mutex::new(SessionConfiguration::default()),
            events_tx,
            events_rx,
            _poll_shutdown: poll_shutdown,
        }
    }

    fn scan(selected: Option<&str>, devices: &[&str]) -> DeviceScan {
        DeviceScan {
            selected: selected.map(str::to_string),
            devices: devices.iter().map(|d| d.to_string()).collect(),
        }
    }

    #[test]
    fn unchanged_route_is_not_reported() {
        let prev = scan(Some("Speakers"), &["Speakers"]);
        let next = scan(Some("Speakers"), &["Speakers", "HDMI"]);
        assert_eq!(classify_route_change(&prev, &next), None);
    }

    #[test]
    fn unplugged_device_loses_route() {
        let prev = scan(Some("Headphones"), &["Speakers", "Headphones"]);
        let next = scan(Some("Speakers"), &["Speakers"]);
        let reason = classify_route_change(&prev, &next).unwrap();
        assert_eq!(reason, RouteChangeReason::OldDeviceUnavailable);
        assert!(reason.loses_route());
    }

    #[test]
    fn plugged_device_is_new() {
        let prev = scan(Some("Speakers"), &["Speakers"]);
        let next = scan(Some("Headphones"), &["Speakers", "Headphones"]);
        assert_eq!(
            classify_route_change(&prev, &next),
            Some(RouteChangeReason::NewDeviceAvailable)
        );
    }

    #[test]
    fn no_remaining_output_is_no_suitable_route() {
        let prev = scan(Some("Speakers"), &["Speakers"]);
        let next = scan(None, &["Speakers"]);
        assert_eq!(
            classify_route_change(&prev, &next),
            Some(RouteChangeReason::NoSuitableRouteForCategory)
        );
    }

    #[test]
    fn switching_between_present_devices_is_override() {
        let prev = scan(Some("Speakers"), &["Speakers", "HDMI"]);
        let next = scan(Some("HDMI"), &["Speakers", "HDMI"]);
        assert_eq!(
            classify_route_change(&prev, &next),
            Some(RouteChangeReason::Override)
        );
    }

    #[test]
    fn set_category_stores_configuration() {
        let platform = detached_platform();
        let configuration = SessionConfiguration {
            category: Category::Playback,
            options: [OptionFlag::DuckOthers].into(),
            mode: SessionMode::SpokenAudio,
        };
        platform.set_category(&configuration).unwrap();
        assert_eq!(*platform.configuration.lock().unwrap(), configuration);
    }

    #[test]
    fn release_needs_no_devices() {
        let platform = detached_platform();
        assert!(platform.set_active(false, ActivationOptions::default()).is_ok());
    }

    #[test]
    fn injected_interruptions_arrive_in_order() {
        let platform = detached_platform();
        let events = platform.events();
        platform.begin_interruption();
        platform.end_interruption();
        assert_eq!(events.try_recv(), Ok(PlatformEvent::Interruption { began: true }));
        assert_eq!(events.try_recv(), Ok(PlatformEvent::Interruption { began: false }));
    }

    #[test]
    fn error_codes_spell_four_char_codes() {
        assert_eq!(CANNOT_START_PLAYING.to_be_bytes(), *b"!pla");
        assert_eq!(CANNOT_START_RECORDING.to_be_bytes(), *b"!rec");
    }
}
