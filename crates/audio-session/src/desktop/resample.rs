//! Offline resample stage.
//!
//! Uses Rubato to convert a decoded asset from its source rate to the output
//! device rate before playback starts.

use anyhow::{Result, anyhow};
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};

/// Resample interleaved `samples` from `src_rate` to `dst_rate`.
///
/// Returns the input unchanged when the rates already match.
pub fn resample_interleaved(
    samples: &[f32],
    channels: usize,
    src_rate: u32,
    dst_rate: u32,
    chunk_frames: usize,
) -> Result<Vec<f32>> {
    if channels == 0 || src_rate == 0 || dst_rate == 0 {
        return Err(anyhow!("invalid resample request: {channels} ch, {src_rate} -> {dst_rate} Hz"));
    }
    if src_rate == dst_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let f_ratio = dst_rate as f64 / src_rate as f64;

    let sinc_len = 128;
    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window,
    };

    let chunk_in_frames = chunk_frames.max(1);
    let mut resampler: Box<dyn Resampler<f32>> = Box::new(
        Async::<f32>::new_sinc(
            f_ratio,
            1.1,
            &params,
            chunk_in_frames,
            channels,
            FixedAsync::Input,
        )
        .map_err(|e| anyhow!("resampler init: {e}"))?,
    );

    let total_frames = samples.len() / channels;
    let input_adapter = InterleavedSlice::new(samples, channels, total_frames)
        .map_err(|e| anyhow!("interleaved slice (input): {e}"))?;

    // Rubato trims the filter delay from the front and pumps silence through
    // the tail, so the output is exactly ceil(total_frames * ratio) frames.
    let capacity_frames = resampler.process_all_needed_output_len(total_frames);
    let mut output = vec![0.0f32; capacity_frames * channels];
    let out_frames = {
        let mut output_adapter = InterleavedSlice::new_mut(&mut output, channels, capacity_frames)
            .map_err(|e| anyhow!("interleaved slice (output): {e}"))?;
        let (_in_frames, out_frames) = resampler
            .process_all_into_buffer(&input_adapter, &mut output_adapter, total_frames, None)
            .map_err(|e| anyhow!("resampler process: {e}"))?;
        out_frames
    };
    output.truncate(out_frames * channels);

    tracing::debug!(
        src_rate,
        dst_rate,
        in_frames = total_frames,
        out_frames,
        "resampled asset"
    );
    Ok(output)
}
