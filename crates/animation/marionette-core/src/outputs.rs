//! Per-tick outputs produced by the scheduler: device commands plus advisory events.

use serde::{Deserialize, Serialize};

use crate::ids::ChannelId;

/// Target position for one channel, in controller units (quarter microseconds).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServoCommand {
    pub channel: ChannelId,
    pub target: u16,
}

/// Observability events. None of these influence motion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    Started {
        total_duration: f64,
        channels: usize,
    },
    /// Playback time passed a keyframe time of any channel.
    KeyframeCrossed {
        index: usize,
        time: f64,
        elapsed_time: f64,
    },
    FinalTarget {
        channel: ChannelId,
        target: u16,
    },
    Completed {
        total_duration: f64,
        ticks: u64,
    },
    Cancelled {
        elapsed_time: f64,
    },
}

/// Buffers reused across ticks.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TickOutputs {
    #[serde(default)]
    pub commands: Vec<ServoCommand>,
    #[serde(default)]
    pub events: Vec<PlaybackEvent>,
}

impl TickOutputs {
    pub fn with_capacity(channels: usize) -> Self {
        Self {
            commands: Vec::with_capacity(channels),
            events: Vec::with_capacity(channels + 2),
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.commands.clear();
        self.events.clear();
    }

    #[inline]
    pub fn push_command(&mut self, command: ServoCommand) {
        self.commands.push(command);
    }

    #[inline]
    pub fn push_event(&mut self, event: PlaybackEvent) {
        self.events.push(event);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.events.is_empty()
    }

    pub fn keyframes_crossed(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, PlaybackEvent::KeyframeCrossed { .. }))
            .count()
    }
}
