//! Desktop playback engine.
//!
//! `load` decodes the asset up front so a missing or corrupt file is reported
//! before the session commits to playing. `play` spawns one output thread per
//! handle that owns the CPAL stream, since streams are not `Send` on every host.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use cpal::traits::StreamTrait;
use crossbeam_channel::{Receiver, Sender, TryRecvError};

use super::decode::{self, DecodedAsset};
use super::device;
use super::output;
use super::platform::CANNOT_START_PLAYING;
use super::resample;
use crate::config::PlaybackConfig;
use crate::error::PlatformError;
use crate::platform::{AssetRef, CompletionCallback, PlaybackEngine, PlaybackHandle};

/// `ENOENT`: the asset file does not exist.
pub const ASSET_NOT_FOUND: i32 = 2;
/// `'typ?'`: the file exists but is not a decodable audio file.
pub const UNSUPPORTED_FILE_TYPE: i32 = 0x7479_703f;

/// Time left for the device to play out its last buffer after the cursor runs dry.
const DRAIN_GRACE: Duration = Duration::from_millis(50);

pub struct SymphoniaEngine {
    config: PlaybackConfig,
}

impl SymphoniaEngine {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl PlaybackEngine for SymphoniaEngine {
    fn load(&self, asset: &AssetRef) -> Result<Box<dyn PlaybackHandle>, PlatformError> {
        if !asset.path.is_file() {
            return Err(PlatformError::new(
                ASSET_NOT_FOUND,
                format!("asset not found: {}", asset.path.display()),
            ));
        }
        let decoded = decode::decode_file(&asset.path)
            .map_err(|e| PlatformError::new(UNSUPPORTED_FILE_TYPE, format!("{e:#}")))?;
        tracing::info!(
            path = ?asset.path,
            rate = decoded.rate,
            channels = decoded.channels,
            duration_ms = decoded.duration_ms(),
            "asset loaded"
        );
        Ok(Box::new(SymphoniaHandle {
            asset: Arc::new(decoded),
            config: self.config.clone(),
            cancel: None,
        }))
    }
}

struct SymphoniaHandle {
    asset: Arc<DecodedAsset>,
    config: PlaybackConfig,
    // Dropping the sender cancels the output thread.
    cancel: Option<Sender<()>>,
}

impl PlaybackHandle for SymphoniaHandle {
    fn play(&mut self, on_complete: CompletionCallback) -> Result<(), PlatformError> {
        self.stop();

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let (cancel_tx, cancel_rx) = crossbeam_channel::bounded::<()>(0);
        let asset = self.asset.clone();
        let config = self.config.clone();

        thread::Builder::new()
            .name("audio-session-output".to_string())
            .spawn(move || run_output(&asset, &config, ready_tx, cancel_rx, on_complete))
            .map_err(|e| PlatformError::new(CANNOT_START_PLAYING, format!("spawn output thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.cancel = Some(cancel_tx);
                Ok(())
            }
            Ok(Err(message)) => Err(PlatformError::new(CANNOT_START_PLAYING, message)),
            Err(_) => Err(PlatformError::new(
                CANNOT_START_PLAYING,
                "output thread exited before starting",
            )),
        }
    }

    fn stop(&mut self) {
        if self.cancel.take().is_some() {
            tracing::debug!("output thread cancelled");
        }
    }
}

impl Drop for SymphoniaHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Output thread body: open the stream, report readiness, then wait for the
/// end of the buffer or cancellation.
fn run_output(
    asset: &DecodedAsset,
    config: &PlaybackConfig,
    ready: Sender<Result<(), String>>,
    cancel: Receiver<()>,
    on_complete: CompletionCallback,
) {
    let (stream, done) = match open_stream(asset, config) {
        Ok(x) => x,
        Err(e) => {
            tracing::warn!("failed to open output stream: {e:#}");
            let _ = ready.send(Err(format!("{e:#}")));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    crossbeam_channel::select! {
        recv(done) -> _ => {
            thread::sleep(DRAIN_GRACE);
            drop(stream);
            // A stop that raced with the end of the buffer wins.
            if matches!(cancel.try_recv(), Err(TryRecvError::Disconnected)) {
                tracing::debug!("output finished after stop; completion suppressed");
                return;
            }
            on_complete();
        }
        recv(cancel) -> _ => {
            drop(stream);
        }
    }
}

fn open_stream(asset: &DecodedAsset, config: &PlaybackConfig) -> Result<(cpal::Stream, Receiver<()>)> {
    let host = cpal::default_host();
    let device = device::pick_device(&host, config.device.as_deref())?;
    let supported = device::pick_output_config(&device, asset.rate)?;
    let sample_format = supported.sample_format();
    let stream_config: cpal::StreamConfig = supported.config();

    let samples = resample::resample_interleaved(
        &asset.samples,
        asset.channels,
        asset.rate,
        stream_config.sample_rate,
        config.chunk_frames,
    )
    .context("resample asset to device rate")?;

    tracing::info!(
        src_rate = asset.rate,
        dst_rate = stream_config.sample_rate,
        channels_out = stream_config.channels,
        format = ?sample_format,
        "opening output stream"
    );

    let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
    let stream = output::build_output_stream(
        &device,
        &stream_config,
        sample_format,
        samples,
        asset.channels,
        done_tx,
    )?;
    stream.play().context("start output stream")?;
    Ok((stream, done_rx))
}
