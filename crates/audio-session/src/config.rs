use std::path::PathBuf;

use serde::Deserialize;

/// Session manager settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionManagerConfig {
    /// Path of the bundled asset played by `play()`.
    pub asset: PathBuf,
    /// Let other apps resume their audio after this session deactivates.
    pub notify_others_on_deactivation: bool,
    pub playback: PlaybackConfig,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            asset: PathBuf::from("example.mp3"),
            notify_others_on_deactivation: true,
            playback: PlaybackConfig::default(),
        }
    }
}

/// Desktop backend tuning.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Output device by substring match; `None` follows the host default.
    pub device: Option<String>,
    /// Resampler chunk size in frames.
    pub chunk_frames: usize,
    /// How often the route poller compares the device list, in milliseconds.
    pub route_poll_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            device: None,
            chunk_frames: 1024,
            route_poll_ms: 500,
        }
    }
}
