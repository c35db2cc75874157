//! Rig configuration: servo pulse ranges, device port, tuning and playback
//! settings.
//!
//! The on-disk JSON is parsed into loose raw structs and then validated once
//! into [`RigConfig`]; nothing downstream re-checks these invariants.
//!
//! ```json
//! {
//!   "port": "/dev/ttyACM0",
//!   "servos": { "0": [1000, 2000], "1": [1200, 1800] },
//!   "tuning": { "0": { "speed": 10, "accel": 4 } },
//!   "playback": { "tick_ms": 10, "tween": "ease_in_out_quad" }
//! }
//! ```

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AnimationError;
use crate::ids::ChannelId;
use crate::tween::Tween;

/// Port used when the configuration does not name one.
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";
/// Serial baud rate used when the configuration does not name one.
pub const DEFAULT_BAUD: u32 = 9600;
/// 100 Hz playback.
pub const DEFAULT_TICK_MS: u64 = 10;
/// Largest pulse width (µs) whose quarter-microsecond command still fits in a u16.
pub const MAX_PULSE: f64 = (u16::MAX / 4) as f64;

/// Channels that receive [`ServoTuning::default`] when the file carries no
/// `tuning` section.
const DEFAULT_TUNED_CHANNELS: [ChannelId; 2] = [ChannelId(0), ChannelId(1)];

/// Physical pulse-width range of one servo, in microseconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PulseRange {
    min_pulse: f64,
    max_pulse: f64,
}

impl PulseRange {
    pub fn new(channel: ChannelId, min_pulse: f64, max_pulse: f64) -> Result<Self, AnimationError> {
        let valid = min_pulse.is_finite()
            && max_pulse.is_finite()
            && min_pulse >= 0.0
            && min_pulse < max_pulse
            && max_pulse <= MAX_PULSE;
        if !valid {
            return Err(AnimationError::InvalidPulseRange {
                channel,
                min_pulse,
                max_pulse,
            });
        }
        Ok(Self {
            min_pulse,
            max_pulse,
        })
    }

    #[inline]
    pub fn min_pulse(&self) -> f64 {
        self.min_pulse
    }

    #[inline]
    pub fn max_pulse(&self) -> f64 {
        self.max_pulse
    }

    #[inline]
    pub fn span(&self) -> f64 {
        self.max_pulse - self.min_pulse
    }
}

/// Controller-side smoothing applied before playback starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServoTuning {
    pub speed: u16,
    pub accel: u16,
}

impl Default for ServoTuning {
    fn default() -> Self {
        Self { speed: 10, accel: 4 }
    }
}

/// Scheduler options.
#[derive(Clone, Copy, Debug)]
pub struct PlaybackSettings {
    pub tick_period: Duration,
    pub tween: Tween,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(DEFAULT_TICK_MS),
            tween: Tween::EaseInOutQuad,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawRigConfig {
    #[serde(default)]
    port: Option<String>,
    #[serde(default)]
    baud: Option<u32>,
    #[serde(default)]
    servos: BTreeMap<String, [f64; 2]>,
    #[serde(default)]
    tuning: Option<BTreeMap<String, ServoTuning>>,
    #[serde(default)]
    playback: Option<RawPlayback>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPlayback {
    #[serde(default)]
    tick_ms: Option<u64>,
    #[serde(default)]
    tween: Option<String>,
}

/// Validated rig description.
#[derive(Clone, Debug)]
pub struct RigConfig {
    pub port: String,
    pub baud: u32,
    servos: BTreeMap<ChannelId, PulseRange>,
    tuning: BTreeMap<ChannelId, ServoTuning>,
    pub playback: PlaybackSettings,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PORT)
    }
}

impl RigConfig {
    /// Empty rig on `port`; add servos with [`RigConfig::with_servo`].
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud: DEFAULT_BAUD,
            servos: BTreeMap::new(),
            tuning: BTreeMap::new(),
            playback: PlaybackSettings::default(),
        }
    }

    pub fn with_servo(mut self, channel: ChannelId, range: PulseRange) -> Self {
        self.servos.insert(channel, range);
        self
    }

    pub fn with_tuning(mut self, channel: ChannelId, tuning: ServoTuning) -> Self {
        self.tuning.insert(channel, tuning);
        self
    }

    pub fn with_playback(mut self, playback: PlaybackSettings) -> Self {
        self.playback = playback;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, AnimationError> {
        let raw: RawRigConfig = serde_json::from_str(json)?;
        Self::validate(raw)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, AnimationError> {
        let raw: RawRigConfig = serde_json::from_reader(reader)?;
        Self::validate(raw)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AnimationError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    fn validate(raw: RawRigConfig) -> Result<Self, AnimationError> {
        let mut servos = BTreeMap::new();
        for (key, [min_pulse, max_pulse]) in raw.servos {
            let channel: ChannelId = key.parse()?;
            let range = PulseRange::new(channel, min_pulse, max_pulse)?;
            if servos.insert(channel, range).is_some() {
                return Err(AnimationError::DuplicateChannel { channel });
            }
        }

        let tuning = match raw.tuning {
            Some(entries) => {
                let mut tuning = BTreeMap::new();
                for (key, t) in entries {
                    let channel: ChannelId = key.parse()?;
                    if !servos.contains_key(&channel) {
                        log::warn!("Tuning for servo {channel} ignored: channel not configured");
                        continue;
                    }
                    tuning.insert(channel, t);
                }
                tuning
            }
            None => DEFAULT_TUNED_CHANNELS
                .iter()
                .filter(|c| servos.contains_key(*c))
                .map(|c| (*c, ServoTuning::default()))
                .collect(),
        };

        let mut playback = PlaybackSettings::default();
        if let Some(p) = raw.playback {
            if let Some(ms) = p.tick_ms {
                if ms == 0 {
                    return Err(AnimationError::InvalidSetting {
                        reason: "tick_ms must be at least 1".into(),
                    });
                }
                playback.tick_period = Duration::from_millis(ms);
            }
            if let Some(name) = p.tween {
                playback.tween = name.parse()?;
            }
        }

        Ok(Self {
            port: raw.port.unwrap_or_else(|| DEFAULT_PORT.to_string()),
            baud: raw.baud.unwrap_or(DEFAULT_BAUD),
            servos,
            tuning,
            playback,
        })
    }

    pub fn servos(&self) -> &BTreeMap<ChannelId, PulseRange> {
        &self.servos
    }

    pub fn pulse_range(&self, channel: ChannelId) -> Option<&PulseRange> {
        self.servos.get(&channel)
    }

    pub fn is_configured(&self, channel: ChannelId) -> bool {
        self.servos.contains_key(&channel)
    }

    pub fn channel_ids(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.servos.keys().copied()
    }

    pub fn tuning(&self) -> impl Iterator<Item = (ChannelId, ServoTuning)> + '_ {
        self.tuning.iter().map(|(c, t)| (*c, *t))
    }
}
