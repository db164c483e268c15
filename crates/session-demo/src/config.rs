//! Demo configuration file.
//!
//! ```toml
//! asset = "example.mp3"
//!
//! [session]
//! category = "playback"
//! options = ["duckOthers"]
//! mode = "spokenAudio"
//!
//! [playback]
//! device = "USB"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use audio_session::SessionManagerConfig;
use audio_session_types::SessionConfiguration;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Configuration applied before playing.
    pub session: SessionConfiguration,
    #[serde(flatten)]
    pub manager: SessionManagerConfig,
}

impl DemoConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg = toml::from_str::<DemoConfig>(&raw)
            .with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio_session_types::{Category, OptionFlag, OptionSet, SessionMode};
    use std::path::PathBuf;

    #[test]
    fn parses_full_file() {
        let cfg: DemoConfig = toml::from_str(
            r#"
            asset = "chime.wav"

            [session]
            category = "playAndRecord"
            options = ["allowBluetooth", "mixWithOthers"]
            mode = "voiceChat"

            [playback]
            device = "USB"
            chunk_frames = 512
            "#,
        )
        .unwrap();

        assert_eq!(cfg.manager.asset, PathBuf::from("chime.wav"));
        assert_eq!(cfg.session.category, Category::PlayAndRecord);
        let expected: OptionSet = [OptionFlag::AllowBluetooth, OptionFlag::MixWithOthers].into();
        assert_eq!(cfg.session.options, expected);
        assert_eq!(cfg.session.mode, SessionMode::VoiceChat);
        assert_eq!(cfg.manager.playback.device.as_deref(), Some("USB"));
        assert_eq!(cfg.manager.playback.chunk_frames, 512);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let cfg: DemoConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.session, SessionConfiguration::default());
        assert_eq!(cfg.manager.asset, PathBuf::from("example.mp3"));
        assert!(cfg.manager.notify_others_on_deactivation);
    }

    #[test]
    fn unknown_category_is_rejected() {
        let result = toml::from_str::<DemoConfig>("[session]\ncategory = \"karaoke\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = DemoConfig::load(Path::new("/nonexistent/session-demo.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("read config"));
    }
}
