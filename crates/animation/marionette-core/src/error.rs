//! Error types for keyframe loading, device output and playback

use crate::ids::ChannelId;
use crate::scheduler::PlaybackPhase;

/// Errors raised while loading keyframes or rig configuration and while
/// building interpolators. All of them surface before playback starts.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AnimationError {
    /// Track with no keyframes
    #[error("Empty track for channel {channel}")]
    EmptyTrack { channel: ChannelId },

    /// Two keyframes of one track share a time stamp
    #[error("Duplicate keyframe time {time} in track for channel {channel}")]
    DuplicateKeyframeTime { channel: ChannelId, time: f64 },

    /// Keyframe with a bad time or position
    #[error("Invalid keyframe on channel {channel}: {reason}")]
    InvalidKeyframe { channel: ChannelId, reason: String },

    /// Same channel listed twice under different keys
    #[error("Duplicate track for channel {channel}")]
    DuplicateChannel { channel: ChannelId },

    /// Channel key that is not a small non-negative integer
    #[error("Invalid channel id: {key}")]
    InvalidChannelId { key: String },

    /// Pulse range with min >= max or values the device cannot express
    #[error("Invalid pulse range for channel {channel}: [{min_pulse}, {max_pulse}]")]
    InvalidPulseRange {
        channel: ChannelId,
        min_pulse: f64,
        max_pulse: f64,
    },

    /// Tween curve name not in the reference set
    #[error("Unknown tween curve: {name}")]
    UnknownTween { name: String },

    /// Playback option out of range
    #[error("Invalid playback setting: {reason}")]
    InvalidSetting { reason: String },

    /// Serialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// IO error
    #[error("IO error: {reason}")]
    IoError { reason: String },
}

impl AnimationError {
    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::EmptyTrack { .. }
            | Self::DuplicateKeyframeTime { .. }
            | Self::InvalidKeyframe { .. }
            | Self::DuplicateChannel { .. } => "track",
            Self::InvalidChannelId { .. }
            | Self::InvalidPulseRange { .. }
            | Self::InvalidSetting { .. } => "config",
            Self::UnknownTween { .. } => "tween",
            Self::SerializationError { .. } => "serialization",
            Self::IoError { .. } => "io",
        }
    }

    /// Channel the error refers to, if any.
    pub fn channel(&self) -> Option<ChannelId> {
        match self {
            Self::EmptyTrack { channel }
            | Self::DuplicateKeyframeTime { channel, .. }
            | Self::InvalidKeyframe { channel, .. }
            | Self::DuplicateChannel { channel }
            | Self::InvalidPulseRange { channel, .. } => Some(*channel),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AnimationError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for AnimationError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError {
            reason: err.to_string(),
        }
    }
}

/// Failures reported by a servo sink (the physical controller connection).
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum SinkError {
    /// Could not acquire the device
    #[error("Failed to open servo controller at {port}: {reason}")]
    Connect { port: String, reason: String },

    /// Transport failure while talking to the device
    #[error("Device IO error during {operation}: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Device or driver refused a command
    #[error("Device rejected {operation} on channel {channel}: {reason}")]
    Rejected {
        operation: &'static str,
        channel: ChannelId,
        reason: String,
    },

    /// Write attempted after the sink was released
    #[error("Servo sink is closed")]
    Closed,
}

impl SinkError {
    #[inline]
    pub fn io(operation: &'static str, source: std::io::Error) -> Self {
        Self::Io { operation, source }
    }
}

/// Errors that abort a playback run.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum PlaybackError {
    /// A command write failed; playback halts without retry
    #[error("Servo sink failed while {phase}: {source}")]
    Device {
        phase: PlaybackPhase,
        #[source]
        source: SinkError,
    },

    /// Scheduler driven out of order
    #[error("Invalid playback state: {current} -> {requested}")]
    InvalidState {
        current: PlaybackPhase,
        requested: PlaybackPhase,
    },
}
