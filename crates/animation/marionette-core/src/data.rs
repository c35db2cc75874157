//! Keyframe data model and JSON loading.
//!
//! Keyframe files map channel keys to `[time, position]` pairs:
//!
//! ```json
//! { "0": [[0.0, 0.5], [2.0, 1.0]], "1": [[0.0, 0.0], [1.5, 0.8]] }
//! ```

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AnimationError;
use crate::ids::ChannelId;

/// Anchor point on a channel's trajectory: seconds on the timeline and a
/// normalized position in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Keyframe {
    pub time: f64,
    pub position: f64,
}

impl Keyframe {
    #[inline]
    pub fn new(time: f64, position: f64) -> Self {
        Self { time, position }
    }
}

impl From<[f64; 2]> for Keyframe {
    fn from([time, position]: [f64; 2]) -> Self {
        Self { time, position }
    }
}

impl From<Keyframe> for [f64; 2] {
    fn from(k: Keyframe) -> Self {
        [k.time, k.position]
    }
}

impl From<(f64, f64)> for Keyframe {
    fn from((time, position): (f64, f64)) -> Self {
        Self { time, position }
    }
}

/// Keyframes for one channel, as supplied (validation happens when the
/// interpolator is built).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub channel: ChannelId,
    pub keyframes: Vec<Keyframe>,
}

impl Track {
    pub fn new<K: Into<Keyframe>>(
        channel: impl Into<ChannelId>,
        keyframes: impl IntoIterator<Item = K>,
    ) -> Self {
        Self {
            channel: channel.into(),
            keyframes: keyframes.into_iter().map(Into::into).collect(),
        }
    }

    /// Latest keyframe time in the track (0 for an empty track).
    pub fn end_time(&self) -> f64 {
        self.keyframes
            .iter()
            .map(|k| k.time)
            .fold(0.0, f64::max)
    }
}

/// All tracks of one animation, ordered by channel id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeyframeSet {
    tracks: Vec<Track>,
}

impl KeyframeSet {
    /// Build from tracks; a channel may appear only once.
    pub fn new(mut tracks: Vec<Track>) -> Result<Self, AnimationError> {
        tracks.sort_by_key(|t| t.channel);
        if let Some(pair) = tracks.windows(2).find(|w| w[0].channel == w[1].channel) {
            return Err(AnimationError::DuplicateChannel {
                channel: pair[0].channel,
            });
        }
        Ok(Self { tracks })
    }

    /// Parse the keyed JSON form (`{"<channel>": [[t, p], ...]}`).
    pub fn from_json_str(json: &str) -> Result<Self, AnimationError> {
        let raw: BTreeMap<String, Vec<Keyframe>> = serde_json::from_str(json)?;
        Self::from_keyed(raw)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, AnimationError> {
        let raw: BTreeMap<String, Vec<Keyframe>> = serde_json::from_reader(reader)?;
        Self::from_keyed(raw)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AnimationError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    fn from_keyed(raw: BTreeMap<String, Vec<Keyframe>>) -> Result<Self, AnimationError> {
        let tracks = raw
            .into_iter()
            .map(|(key, keyframes)| {
                let channel: ChannelId = key.parse()?;
                Ok(Track { channel, keyframes })
            })
            .collect::<Result<Vec<_>, AnimationError>>()?;
        Self::new(tracks)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, channel: ChannelId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.channel == channel)
    }

    pub fn channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.tracks.iter().map(|t| t.channel)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Serialize back to the keyed JSON form.
    pub fn to_json_value(&self) -> serde_json::Value {
        let map: BTreeMap<String, &Vec<Keyframe>> = self
            .tracks
            .iter()
            .map(|t| (t.channel.to_string(), &t.keyframes))
            .collect();
        serde_json::json!(map)
    }
}
