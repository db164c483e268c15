//! Output stage (CPAL stream).
//!
//! Plays an in-memory interleaved buffer through a CPAL output stream. The
//! callback maps channels, converts `f32` to the device sample format, and
//! fires the `done` signal once after the last frame.

use anyhow::{Result, anyhow};
use cpal::traits::DeviceTrait;
use crossbeam_channel::Sender;

/// Build a CPAL output stream over `samples` (already at the device rate).
///
/// `done` receives exactly one message once the buffer is exhausted.
pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    samples: Vec<f32>,
    src_channels: usize,
    done: Sender<()>,
) -> Result<cpal::Stream> {
    let cursor = PlaybackCursor::new(samples, src_channels);
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, cursor, done),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, cursor, done),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, cursor, done),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, cursor, done),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut cursor: PlaybackCursor,
    done: Sender<()>,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = config.channels as usize;
    let err_fn = |err| tracing::warn!("stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            let filled = cursor.fill(data.len() / channels_out.max(1), channels_out, |idx, v| {
                data[idx] = <T as cpal::Sample>::from_sample::<f32>(v);
            });
            for sample in data.iter_mut().skip(filled * channels_out) {
                *sample = <T as cpal::Sample>::from_sample::<f32>(0.0);
            }
            if cursor.is_finished() && !cursor.signalled {
                cursor.signalled = true;
                let _ = done.try_send(());
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Read position over the decoded buffer.
struct PlaybackCursor {
    samples: Vec<f32>,
    src_channels: usize,
    pos: usize,
    signalled: bool,
}

impl PlaybackCursor {
    fn new(samples: Vec<f32>, src_channels: usize) -> Self {
        Self {
            samples,
            src_channels: src_channels.max(1),
            pos: 0,
            signalled: false,
        }
    }

    fn is_finished(&self) -> bool {
        self.pos >= self.samples.len()
    }

    /// Write up to `frames` mapped frames through `write(index, sample)`.
    ///
    /// Returns the number of frames written.
    fn fill(&mut self, frames: usize, dst_channels: usize, mut write: impl FnMut(usize, f32)) -> usize {
        let mut filled = 0;
        while filled < frames && !self.is_finished() {
            for ch in 0..dst_channels {
                write(filled * dst_channels + ch, self.mapped_sample(dst_channels, ch));
            }
            self.pos += self.src_channels;
            filled += 1;
        }
        filled
    }

    /// Sample for `dst_ch` of the current frame.
    ///
    /// mono to stereo duplicates, stereo to mono averages, anything else clamps
    /// to the last available source channel.
    fn mapped_sample(&self, dst_channels: usize, dst_ch: usize) -> f32 {
        let get = |ch: usize| -> f32 {
            if ch < self.src_channels {
                self.samples.get(self.pos + ch).copied().unwrap_or(0.0)
            } else {
                0.0
            }
        };
        match (self.src_channels, dst_channels) {
            (1, 1) => get(0),
            (2, 2) => get(dst_ch.min(1)),
            (2, 1) => 0.5 * (get(0) + get(1)),
            (1, 2) => get(0),
            _ => get(dst_ch.min(self.src_channels - 1)),
        }
    }
}
