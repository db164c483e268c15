use std::fmt;

use serde::{Deserialize, Serialize};

/// Primary intended use of an audio session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    /// Playback that mixes with other apps and is silenced by the ring/silent switch.
    Ambient,
    /// Separate streams to several output routes at once (input and output).
    MultiRoute,
    /// Simultaneous input and output, e.g. VoIP.
    PlayAndRecord,
    /// Output is the main purpose of the app.
    Playback,
    /// Input only; output is silenced.
    Record,
    /// Default category: non-mixable playback silenced by the ring/silent switch.
    SoloAmbient,
}

impl Category {
    /// Every category in catalog order.
    pub const ALL: [Category; 6] = [
        Category::Ambient,
        Category::MultiRoute,
        Category::PlayAndRecord,
        Category::Playback,
        Category::Record,
        Category::SoloAmbient,
    ];

    /// Platform identifier for the category.
    pub fn name(self) -> &'static str {
        match self {
            Category::Ambient => "ambient",
            Category::MultiRoute => "multiRoute",
            Category::PlayAndRecord => "playAndRecord",
            Category::Playback => "playback",
            Category::Record => "record",
            Category::SoloAmbient => "soloAmbient",
        }
    }

    /// `true` when the category sends audio to an output route.
    pub fn plays_audio(self) -> bool {
        !matches!(self, Category::Record)
    }

    /// `true` when the category captures input.
    pub fn records_audio(self) -> bool {
        matches!(
            self,
            Category::Record | Category::PlayAndRecord | Category::MultiRoute
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Independent modifier of session behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OptionFlag {
    MixWithOthers,
    DuckOthers,
    InterruptSpokenAudioAndMixWithOthers,
    /// Hands-free Bluetooth profile (input and output).
    AllowBluetooth,
    /// High-quality Bluetooth output.
    AllowBluetoothA2DP,
    AllowAirPlay,
    DefaultToSpeaker,
}

impl OptionFlag {
    /// Every option flag in catalog order.
    pub const ALL: [OptionFlag; 7] = [
        OptionFlag::MixWithOthers,
        OptionFlag::DuckOthers,
        OptionFlag::InterruptSpokenAudioAndMixWithOthers,
        OptionFlag::AllowBluetooth,
        OptionFlag::AllowBluetoothA2DP,
        OptionFlag::AllowAirPlay,
        OptionFlag::DefaultToSpeaker,
    ];

    /// Platform identifier for the flag.
    pub fn name(self) -> &'static str {
        match self {
            OptionFlag::MixWithOthers => "mixWithOthers",
            OptionFlag::DuckOthers => "duckOthers",
            OptionFlag::InterruptSpokenAudioAndMixWithOthers => {
                "interruptSpokenAudioAndMixWithOthers"
            }
            OptionFlag::AllowBluetooth => "allowBluetooth",
            OptionFlag::AllowBluetoothA2DP => "allowBluetoothA2DP",
            OptionFlag::AllowAirPlay => "allowAirPlay",
            OptionFlag::DefaultToSpeaker => "defaultToSpeaker",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for OptionFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of option flags. Membership only; iteration follows catalog order.
///
/// Serialized as a list of flag names so config files stay readable.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<OptionFlag>", into = "Vec<OptionFlag>")]
pub struct OptionSet(u8);

impl OptionSet {
    /// The empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn contains(&self, flag: OptionFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    /// Add `flag`; returns `true` if it was not already present.
    pub fn insert(&mut self, flag: OptionFlag) -> bool {
        let added = !self.contains(flag);
        self.0 |= flag.bit();
        added
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn union(self, other: OptionSet) -> OptionSet {
        OptionSet(self.0 | other.0)
    }

    pub fn intersection(self, other: OptionSet) -> OptionSet {
        OptionSet(self.0 & other.0)
    }

    /// Flags in `self` that are not in `other`.
    pub fn difference(self, other: OptionSet) -> OptionSet {
        OptionSet(self.0 & !other.0)
    }

    pub fn is_subset(&self, other: &OptionSet) -> bool {
        self.0 & !other.0 == 0
    }

    /// Iterate flags in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = OptionFlag> + '_ {
        OptionFlag::ALL.into_iter().filter(|f| self.contains(*f))
    }
}

impl FromIterator<OptionFlag> for OptionSet {
    fn from_iter<I: IntoIterator<Item = OptionFlag>>(iter: I) -> Self {
        let mut set = OptionSet::empty();
        for flag in iter {
            set.insert(flag);
        }
        set
    }
}

impl<const N: usize> From<[OptionFlag; N]> for OptionSet {
    fn from(flags: [OptionFlag; N]) -> Self {
        flags.into_iter().collect()
    }
}

impl From<Vec<OptionFlag>> for OptionSet {
    fn from(flags: Vec<OptionFlag>) -> Self {
        flags.into_iter().collect()
    }
}

impl From<OptionSet> for Vec<OptionFlag> {
    fn from(set: OptionSet) -> Self {
        set.iter().collect()
    }
}

impl fmt::Debug for OptionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(OptionFlag::name)).finish()
    }
}

impl fmt::Display for OptionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, flag) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(flag.name())?;
        }
        f.write_str("]")
    }
}

/// Specialized behavior requested together with the category.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionMode {
    #[default]
    Default,
    SpokenAudio,
    MoviePlayback,
    VoiceChat,
}

impl SessionMode {
    pub const ALL: [SessionMode; 4] = [
        SessionMode::Default,
        SessionMode::SpokenAudio,
        SessionMode::MoviePlayback,
        SessionMode::VoiceChat,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SessionMode::Default => "default",
            SessionMode::SpokenAudio => "spokenAudio",
            SessionMode::MoviePlayback => "moviePlayback",
            SessionMode::VoiceChat => "voiceChat",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Category, options and mode applied to the platform session as one unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionConfiguration {
    pub category: Category,
    #[serde(default)]
    pub options: OptionSet,
    #[serde(default)]
    pub mode: SessionMode,
}

impl SessionConfiguration {
    pub fn new(category: Category, options: OptionSet) -> Self {
        Self {
            category,
            options,
            mode: SessionMode::Default,
        }
    }
}

impl Default for SessionConfiguration {
    /// Plain playback with no options.
    fn default() -> Self {
        Self::new(Category::Playback, OptionSet::empty())
    }
}

/// Activation lifecycle of the session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    #[default]
    Inactive,
    Activating,
    Active,
    Deactivating,
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActivationState::Inactive => "inactive",
            ActivationState::Activating => "activating",
            ActivationState::Active => "active",
            ActivationState::Deactivating => "deactivating",
        };
        f.write_str(name)
    }
}

/// Why an active session was deactivated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeactivationReason {
    /// Caller asked to stop.
    UserStop,
    /// The asset played to its end.
    PlaybackFinished,
    /// Another session (phone call, alarm) took over the hardware.
    InterruptionBegan,
    /// The output device carrying audio went away.
    RouteLost,
    /// Playback could not start after the session was activated for it.
    PlaybackFailed,
}

impl fmt::Display for DeactivationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeactivationReason::UserStop => "user_stop",
            DeactivationReason::PlaybackFinished => "playback_finished",
            DeactivationReason::InterruptionBegan => "interruption_began",
            DeactivationReason::RouteLost => "route_lost",
            DeactivationReason::PlaybackFailed => "playback_failed",
        };
        f.write_str(name)
    }
}

/// Reason why playback ended.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackEndReason {
    /// Natural end of the asset.
    Eof,
    /// Decoder or output error interrupted playback.
    Error,
    /// Playback was explicitly stopped.
    Stopped,
}

/// Physical or logical kind of an output endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortKind {
    BuiltInSpeaker,
    Headphones,
    Bluetooth,
    AirPlay,
    Usb,
    Hdmi,
    #[default]
    Other,
}

/// One output endpoint currently carrying audio.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputPort {
    /// Display name reported by the platform.
    pub name: String,
    #[serde(default)]
    pub kind: PortKind,
}

impl OutputPort {
    pub fn new(name: impl Into<String>, kind: PortKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered outputs of the current route. Replaced wholesale on every route change.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSnapshot {
    pub outputs: Vec<OutputPort>,
}

impl RouteSnapshot {
    pub fn new(outputs: Vec<OutputPort>) -> Self {
        Self { outputs }
    }

    /// Output port names in route order.
    pub fn names(&self) -> Vec<String> {
        self.outputs.iter().map(|p| p.name.clone()).collect()
    }

    /// Name of the primary output, if any.
    pub fn primary_name(&self) -> Option<&str> {
        self.outputs.first().map(|p| p.name.as_str())
    }
}

/// Why the platform changed the route.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteChangeReason {
    #[default]
    Unknown,
    NewDeviceAvailable,
    OldDeviceUnavailable,
    CategoryChange,
    Override,
    WakeFromSleep,
    NoSuitableRouteForCategory,
    RouteConfigurationChange,
}

impl RouteChangeReason {
    /// `true` when the device that was carrying audio is gone.
    pub fn loses_route(self) -> bool {
        matches!(
            self,
            RouteChangeReason::OldDeviceUnavailable | RouteChangeReason::NoSuitableRouteForCategory
        )
    }
}

/// Point-in-time view of the session manager returned to callers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub configuration: SessionConfiguration,
    pub state: ActivationState,
    /// `true` between interruption begin and end.
    pub interrupted: bool,
    pub last_deactivation: Option<DeactivationReason>,
    /// Output port names of the current route.
    pub outputs: Vec<String>,
    pub playing: bool,
    pub last_playback_end: Option<PlaybackEndReason>,
}
