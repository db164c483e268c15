//! Static catalog of session categories, option flags and modes.
//!
//! Also holds the compatibility table the state machine validates against:
//! which flags each category accepts, and which flags exclude each other.

use audio_session_types::{Category, OptionFlag, OptionSet, SessionMode};

/// Anything the catalog can name.
pub trait CatalogEntry: Copy {
    fn catalog_name(self) -> &'static str;
}

impl CatalogEntry for Category {
    fn catalog_name(self) -> &'static str {
        self.name()
    }
}

impl CatalogEntry for OptionFlag {
    fn catalog_name(self) -> &'static str {
        self.name()
    }
}

impl CatalogEntry for SessionMode {
    fn catalog_name(self) -> &'static str {
        self.name()
    }
}

/// All categories, in the order a picker should list them.
pub fn list_categories() -> Vec<Category> {
    Category::ALL.to_vec()
}

/// All option flags, in the order a picker should list them.
pub fn list_options() -> Vec<OptionFlag> {
    OptionFlag::ALL.to_vec()
}

pub fn list_modes() -> Vec<SessionMode> {
    SessionMode::ALL.to_vec()
}

/// Display name of a catalog entry.
pub fn name_of<T: CatalogEntry>(entry: T) -> &'static str {
    entry.catalog_name()
}

/// Inverse of [`name_of`] for categories. Matching is case-insensitive.
pub fn parse_category(name: &str) -> Option<Category> {
    parse_entry(Category::ALL, name)
}

/// Inverse of [`name_of`] for option flags. Matching is case-insensitive.
pub fn parse_option(name: &str) -> Option<OptionFlag> {
    parse_entry(OptionFlag::ALL, name)
}

pub fn parse_mode(name: &str) -> Option<SessionMode> {
    parse_entry(SessionMode::ALL, name)
}

fn parse_entry<T: CatalogEntry, const N: usize>(all: [T; N], name: &str) -> Option<T> {
    let name = name.trim();
    all.into_iter()
        .find(|entry| entry.catalog_name().eq_ignore_ascii_case(name))
}

/// Flags at most one of which may be set: each replaces the others' mixing policy.
pub const MIXING_POLICY: [OptionFlag; 3] = [
    OptionFlag::MixWithOthers,
    OptionFlag::DuckOthers,
    OptionFlag::InterruptSpokenAudioAndMixWithOthers,
];

/// Groups of mutually exclusive flags.
pub fn exclusive_groups() -> Vec<OptionSet> {
    vec![OptionSet::from(MIXING_POLICY)]
}

/// Flags `category` accepts.
///
/// Mixing policies only make sense for categories that interrupt others by default,
/// hands-free Bluetooth needs an input, and speaker-default is rejected by every
/// category that records.
pub fn allowed_options(category: Category) -> OptionSet {
    use OptionFlag::*;
    match category {
        Category::Ambient | Category::SoloAmbient => {
            [AllowBluetoothA2DP, AllowAirPlay, DefaultToSpeaker].into()
        }
        Category::Playback => [
            MixWithOthers,
            DuckOthers,
            InterruptSpokenAudioAndMixWithOthers,
            AllowBluetoothA2DP,
            AllowAirPlay,
            DefaultToSpeaker,
        ]
        .into(),
        Category::PlayAndRecord => [
            MixWithOthers,
            DuckOthers,
            InterruptSpokenAudioAndMixWithOthers,
            AllowBluetooth,
            AllowBluetoothA2DP,
            AllowAirPlay,
        ]
        .into(),
        Category::MultiRoute => [
            MixWithOthers,
            DuckOthers,
            InterruptSpokenAudioAndMixWithOthers,
            AllowBluetoothA2DP,
        ]
        .into(),
        Category::Record => [AllowBluetooth].into(),
    }
}

/// Flags in `options` that `category` or the exclusive groups reject.
///
/// Empty when the combination is valid. For an exclusive group, every member that
/// was requested is reported, since none of them wins over the others.
pub fn incompatible_options(category: Category, options: OptionSet) -> OptionSet {
    let mut offending = options.difference(allowed_options(category));
    for group in exclusive_groups() {
        let requested = options.intersection(group);
        if requested.len() > 1 {
            offending = offending.union(requested);
        }
    }
    offending
}
