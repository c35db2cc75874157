//! Engine: owns channel interpolators, the shared tween and the timeline length.
//!
//! Sampling maps playback time through the tween once and evaluates every
//! channel at that single tweened time, so all channels of one sample share
//! the same logical instant.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::RigConfig;
use crate::data::{KeyframeSet, Track};
use crate::error::AnimationError;
use crate::ids::ChannelId;
use crate::interp::ChannelInterpolator;
use crate::tween::Tween;

/// Normalized position of one channel at one sampled instant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelSample {
    pub channel: ChannelId,
    pub value: f64,
}

/// Immutable after construction; sampling takes `&self`.
#[derive(Clone, Debug)]
pub struct AnimationEngine {
    channels: Vec<ChannelInterpolator>,
    tween: Tween,
    total_duration: f64,
    keyframe_times: Vec<f64>,
    skipped: Vec<ChannelId>,
}

impl AnimationEngine {
    /// Build interpolators for every track whose channel is configured in `config`.
    pub fn build(
        keyframes: &KeyframeSet,
        config: &RigConfig,
        tween: Tween,
    ) -> Result<Self, AnimationError> {
        Self::from_tracks(keyframes.tracks(), |c| config.is_configured(c), tween)
    }

    /// Build from raw tracks. Tracks rejected by `is_configured` are skipped
    /// with a warning and do not contribute to the timeline.
    pub fn from_tracks(
        tracks: &[Track],
        is_configured: impl Fn(ChannelId) -> bool,
        tween: Tween,
    ) -> Result<Self, AnimationError> {
        let mut channels: Vec<ChannelInterpolator> = Vec::with_capacity(tracks.len());
        let mut skipped = Vec::new();
        let mut keyframe_times = Vec::new();

        for track in tracks {
            if !is_configured(track.channel) {
                log::warn!(
                    "Servo {} not defined in rig config. Skipping.",
                    track.channel
                );
                skipped.push(track.channel);
                continue;
            }
            if channels.iter().any(|c| c.channel() == track.channel) {
                return Err(AnimationError::DuplicateChannel {
                    channel: track.channel,
                });
            }
            let interp = ChannelInterpolator::new(track)?;
            keyframe_times.extend_from_slice(interp.times());
            channels.push(interp);
        }

        channels.sort_by_key(|c| c.channel());
        keyframe_times.sort_by(f64::total_cmp);
        keyframe_times.dedup();
        let total_duration = keyframe_times.last().copied().unwrap_or(0.0);

        log::debug!(
            "engine built: {} channels, {} keyframe times, {:.3}s, tween {}",
            channels.len(),
            keyframe_times.len(),
            total_duration,
            tween
        );

        Ok(Self {
            channels,
            tween,
            total_duration,
            keyframe_times,
            skipped,
        })
    }

    /// Timeline position (seconds) that playback time `elapsed_time` maps to.
    #[inline]
    pub fn tweened_time(&self, elapsed_time: f64) -> f64 {
        let progress = if self.total_duration > 0.0 {
            elapsed_time / self.total_duration
        } else {
            0.0
        };
        self.tween.apply(progress) * self.total_duration
    }

    /// Sample all channels at `elapsed_time`.
    pub fn sample(&self, elapsed_time: f64) -> BTreeMap<ChannelId, f64> {
        let t = self.tweened_time(elapsed_time);
        self.channels
            .iter()
            .map(|c| (c.channel(), c.evaluate(t)))
            .collect()
    }

    /// Allocation-free variant of [`AnimationEngine::sample`]: clears `out` and
    /// fills it in channel order.
    pub fn sample_into(&self, elapsed_time: f64, out: &mut Vec<ChannelSample>) {
        out.clear();
        let t = self.tweened_time(elapsed_time);
        out.extend(self.channels.iter().map(|c| ChannelSample {
            channel: c.channel(),
            value: c.evaluate(t),
        }));
    }

    #[inline]
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    #[inline]
    pub fn tween(&self) -> Tween {
        self.tween
    }

    /// Sorted unique keyframe times across all playing channels.
    pub fn keyframe_times(&self) -> &[f64] {
        &self.keyframe_times
    }

    /// Channels present in the keyframes but missing from the rig config.
    pub fn skipped_channels(&self) -> &[ChannelId] {
        &self.skipped
    }

    pub fn channel_ids(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.channels.iter().map(|c| c.channel())
    }

    pub fn interpolator(&self, channel: ChannelId) -> Option<&ChannelInterpolator> {
        self.channels.iter().find(|c| c.channel() == channel)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
