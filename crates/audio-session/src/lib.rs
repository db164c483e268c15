//! Audio session management: category and option configuration, activation
//! lifecycle, output-route observation and single-asset playback.
//!
//! [`SessionManager`] is the entry point. The [`desktop`] module provides a
//! backend over CPAL; other backends implement the traits in [`platform`].

pub mod catalog;
pub mod config;
pub mod desktop;
pub mod error;
pub mod manager;
pub mod platform;
pub mod playback;
pub mod route;
pub mod session;

pub use audio_session_types as types;
pub use config::{PlaybackConfig, SessionManagerConfig};
pub use manager::SessionManager;
