//! Output device discovery and selection.
//!
//! Thin wrappers around CPAL for:
//! - picking the default device or a device by substring match
//! - choosing a stream config close to the asset's sample rate
//! - describing the current route as [`OutputPort`]s

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait};

use audio_session_types::{OutputPort, PortKind, RouteSnapshot};

/// Pick the first output device matching `needle` (case-insensitive), or the default device.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    if let Some(needle) = needle {
        let mut devices = host.output_devices().context("No output devices")?;
        return devices
            .find(|d| {
                device_name(d)
                    .map(|n| matches_device_name(&n, needle))
                    .unwrap_or(false)
            })
            .ok_or_else(|| anyhow!("No output device matched: {needle}"));
    }

    host.default_output_device()
        .ok_or_else(|| anyhow!("No default output device"))
}

/// Choose the output config for a target sample rate.
///
/// Prefers the highest supported rate that is **<= target_rate** (exact when the
/// device supports it); if none are <=, the lowest rate above it.
pub fn pick_output_config(
    device: &cpal::Device,
    target_rate: u32,
) -> Result<cpal::SupportedStreamConfig> {
    let ranges: Vec<cpal::SupportedStreamConfigRange> =
        device.supported_output_configs()?.collect();

    let mut best: Option<(bool, u32, u8, cpal::SupportedStreamConfig)> = None;
    for range in ranges {
        let rate = pick_rate_for_range(range.min_sample_rate(), range.max_sample_rate(), target_rate);
        let below = rate <= target_rate;
        let format_rank = sample_format_rank(range.sample_format());
        let replace = match &best {
            None => true,
            Some((b_below, b_rate, b_rank, _)) => {
                is_better_candidate(below, rate, format_rank, *b_below, *b_rate, *b_rank)
            }
        };
        if replace {
            best = Some((below, rate, format_rank, range.with_sample_rate(rate)));
        }
    }

    best.map(|(_, _, _, cfg)| cfg)
        .ok_or_else(|| anyhow!("No supported output configs"))
}

/// Route as seen by the desktop: the selected output device, if present.
pub fn current_route(host: &cpal::Host, needle: Option<&str>) -> RouteSnapshot {
    match pick_device(host, needle).ok().and_then(|d| device_name(&d)) {
        Some(name) => {
            let kind = classify_port(&name);
            RouteSnapshot::new(vec![OutputPort::new(name, kind)])
        }
        None => RouteSnapshot::default(),
    }
}

/// Names of every output device the host reports.
pub fn output_device_names(host: &cpal::Host) -> Vec<String> {
    match host.output_devices() {
        Ok(devices) => devices.filter_map(|d| device_name(&d)).collect(),
        Err(e) => {
            tracing::warn!("listing output devices failed: {e}");
            Vec::new()
        }
    }
}

/// `true` when the host can capture audio.
pub fn has_input_device(host: &cpal::Host) -> bool {
    host.default_input_device().is_some()
}

fn device_name(device: &cpal::Device) -> Option<String> {
    device.description().ok().map(|d| d.to_string())
}

/// Best-effort port kind from a device's display name.
pub fn classify_port(name: &str) -> PortKind {
    let name = name.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| name.contains(n));
    if has(&["airplay"]) {
        PortKind::AirPlay
    } else if has(&["bluetooth", "airpods", "a2dp", "hands-free", "headset"]) {
        PortKind::Bluetooth
    } else if has(&["hdmi", "displayport"]) {
        PortKind::Hdmi
    } else if has(&["usb"]) {
        PortKind::Usb
    } else if has(&["headphone"]) {
        PortKind::Headphones
    } else if has(&["speaker", "built-in"]) {
        PortKind::BuiltInSpeaker
    } else {
        PortKind::Other
    }
}

fn pick_rate_for_range(min: u32, max: u32, target: u32) -> u32 {
    target.clamp(min, max.max(min))
}

fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => 10,
    }
}

fn is_better_candidate(
    below: bool,
    rate: u32,
    format_rank: u8,
    best_below: bool,
    best_rate: u32,
    best_rank: u8,
) -> bool {
    if below != best_below {
        below
    } else if rate != best_rate {
        // Below target: closer means higher. Above target: closer means lower.
        if below { rate > best_rate } else { rate < best_rate }
    } else {
        format_rank < best_rank
    }
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&needle.to_lowercase())
}
