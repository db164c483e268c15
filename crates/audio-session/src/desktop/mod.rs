//! Desktop backend: CPAL for devices and output, Symphonia for decode, Rubato
//! for sample-rate conversion.

mod decode;
mod device;
mod engine;
mod output;
mod platform;
mod resample;

use std::sync::Arc;

pub use engine::{ASSET_NOT_FOUND, SymphoniaEngine, UNSUPPORTED_FILE_TYPE};
pub use platform::{CANNOT_START_PLAYING, CANNOT_START_RECORDING, CpalSessionPlatform};

use crate::config::SessionManagerConfig;
use crate::manager::SessionManager;

/// Names of the host's output devices.
pub fn output_device_names() -> Vec<String> {
    device::output_device_names(&cpal::default_host())
}

/// Build a [`SessionManager`] over the desktop backend.
///
/// The platform is returned as well so the caller can inject interruptions.
pub fn session_manager(config: &SessionManagerConfig) -> (SessionManager, Arc<CpalSessionPlatform>) {
    let platform = Arc::new(CpalSessionPlatform::new(&config.playback));
    let engine = Arc::new(SymphoniaEngine::new(&config.playback));
    let manager = SessionManager::new(platform.clone(), engine, config);
    (manager, platform)
}
