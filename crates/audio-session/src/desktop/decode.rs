//! Whole-asset decode.
//!
//! Uses Symphonia to probe the asset's container and decode every packet into
//! one interleaved `f32` buffer. The session only ever plays a short bundled
//! asset, so nothing here streams.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Fully decoded asset.
#[derive(Clone, Debug)]
pub struct DecodedAsset {
    pub rate: u32,
    pub channels: usize,
    /// Interleaved samples, `frames() * channels` long.
    pub samples: Vec<f32>,
    pub codec: Option<String>,
}

impl DecodedAsset {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    pub fn duration_ms(&self) -> u64 {
        if self.rate == 0 {
            return 0;
        }
        (self.frames() as u64).saturating_mul(1000) / self.rate as u64
    }
}

/// Decode the file at `path`.
pub fn decode_file(path: &Path) -> Result<DecodedAsset> {
    let file = File::open(path).with_context(|| format!("open {:?}", path))?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("No default audio track"))?;
    let track_id = track.id;
    let codec_params: CodecParameters = track.codec_params.clone();

    let channels = codec_params
        .channels
        .ok_or_else(|| anyhow!("Unknown channels"))?
        .count();
    let rate = codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("Unknown sample rate"))?;

    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e).context("read packet"),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!("skipping undecodable packet: {e}");
                continue;
            }
            Err(e) => return Err(e).context("decode packet"),
        };

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, *decoded.spec());
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    if samples.is_empty() {
        return Err(anyhow!("asset contains no audio"));
    }

    let codec = codec_name_from_params(&codec_params);
    tracing::debug!(
        path = ?path,
        rate,
        channels,
        codec = codec.as_deref().unwrap_or("unknown"),
        frames = samples.len() / channels.max(1),
        "decoded asset"
    );

    Ok(DecodedAsset {
        rate,
        channels,
        samples,
        codec,
    })
}

/// Best-effort codec label for logs.
fn codec_name_from_params(params: &CodecParameters) -> Option<String> {
    use symphonia::core::codecs::*;
    let name = match params.codec {
        CODEC_TYPE_FLAC => "FLAC",
        CODEC_TYPE_MP3 => "MP3",
        CODEC_TYPE_AAC => "AAC",
        CODEC_TYPE_ALAC => "ALAC",
        CODEC_TYPE_VORBIS => "VORBIS",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM_S16",
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM_S24",
        CODEC_TYPE_PCM_S32LE | CODEC_TYPE_PCM_S32BE => "PCM_S32",
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "PCM_F32",
        _ => return None,
    };
    Some(name.to_string())
}
