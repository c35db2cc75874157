//! Normalized position → pulse width → controller command.
//!
//! The controller takes targets in quarter-microsecond units. The pulse width
//! is truncated to whole microseconds before scaling, matching the firmware
//! tooling these rigs were tuned against (1250.9 µs → 1250 µs → 5000).

use std::collections::BTreeMap;

use crate::config::{PulseRange, RigConfig};
use crate::ids::ChannelId;

/// Controller units per microsecond.
pub const UNITS_PER_MICROSECOND: u16 = 4;

/// Pulse width in microseconds for a normalized value. The value is clamped
/// into `[0, 1]` (NaN maps to 0) so the result always lies inside `range`.
#[inline]
pub fn pulse_width(range: &PulseRange, normalized: f64) -> f64 {
    let v = if normalized.is_nan() {
        0.0
    } else {
        normalized.clamp(0.0, 1.0)
    };
    range.min_pulse() + range.span() * v
}

/// Quarter-microsecond device command for a pulse width.
#[inline]
pub fn device_command(pulse: f64) -> u16 {
    (pulse.trunc() as u16).saturating_mul(UNITS_PER_MICROSECOND)
}

/// Full mapping for one channel.
#[inline]
pub fn map(range: &PulseRange, normalized: f64) -> u16 {
    device_command(pulse_width(range, normalized))
}

/// Per-channel pulse ranges, fixed after load.
#[derive(Clone, Debug, Default)]
pub struct ActuationMapper {
    ranges: BTreeMap<ChannelId, PulseRange>,
}

impl ActuationMapper {
    pub fn new(ranges: BTreeMap<ChannelId, PulseRange>) -> Self {
        Self { ranges }
    }

    pub fn from_config(config: &RigConfig) -> Self {
        Self::new(config.servos().clone())
    }

    pub fn range(&self, channel: ChannelId) -> Option<&PulseRange> {
        self.ranges.get(&channel)
    }

    /// Device command for `channel`, or `None` when the channel has no range.
    #[inline]
    pub fn command_for(&self, channel: ChannelId, normalized: f64) -> Option<u16> {
        self.ranges.get(&channel).map(|r| map(r, normalized))
    }
}
