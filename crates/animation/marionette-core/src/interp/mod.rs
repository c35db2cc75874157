//! Per-channel keyframe interpolation.
//!
//! A [`ChannelInterpolator`] is built once from a [`Track`] and evaluated every
//! tick. Before the first keyframe it holds the first position, after the last
//! keyframe it holds the last position, and between keyframes it blends
//! linearly.

pub mod functions;

use crate::data::Track;
use crate::error::AnimationError;
use crate::ids::ChannelId;

use functions::{find_segment, lerp};

/// Immutable piecewise-linear trajectory for one channel.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelInterpolator {
    channel: ChannelId,
    times: Vec<f64>,
    positions: Vec<f64>,
}

impl ChannelInterpolator {
    /// Validate and sort a track. Fails on an empty track, on non-finite or
    /// negative times, on positions outside `[0, 1]` and on duplicate times.
    pub fn new(track: &Track) -> Result<Self, AnimationError> {
        let channel = track.channel;
        if track.keyframes.is_empty() {
            return Err(AnimationError::EmptyTrack { channel });
        }

        for k in &track.keyframes {
            if !k.time.is_finite() || k.time < 0.0 {
                return Err(AnimationError::InvalidKeyframe {
                    channel,
                    reason: format!("time {} must be finite and non-negative", k.time),
                });
            }
            if !(0.0..=1.0).contains(&k.position) {
                return Err(AnimationError::InvalidKeyframe {
                    channel,
                    reason: format!("position {} at t={} is outside [0, 1]", k.position, k.time),
                });
            }
        }

        let mut keyframes = track.keyframes.clone();
        keyframes.sort_by(|a, b| a.time.total_cmp(&b.time));
        if let Some(pair) = keyframes.windows(2).find(|w| w[0].time == w[1].time) {
            return Err(AnimationError::DuplicateKeyframeTime {
                channel,
                time: pair[0].time,
            });
        }

        Ok(Self {
            channel,
            times: keyframes.iter().map(|k| k.time).collect(),
            positions: keyframes.iter().map(|k| k.position).collect(),
        })
    }

    /// Normalized position at timeline value `t` (seconds).
    pub fn evaluate(&self, t: f64) -> f64 {
        if t.is_nan() {
            return self.positions[0];
        }
        let (i0, i1, lt) = find_segment(&self.times, t);
        if i0 == i1 {
            return self.positions[i0];
        }
        lerp(self.positions[i0], self.positions[i1], lt)
    }

    #[inline]
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Sorted keyframe times.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn first_time(&self) -> f64 {
        self.times[0]
    }

    pub fn last_time(&self) -> f64 {
        self.times[self.times.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Always false: construction rejects empty tracks.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}
