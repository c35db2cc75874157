//! Servo sink boundary: the physical controller connection.
//!
//! Drivers implement [`ServoSink`]. [`SinkGuard`] gives scoped ownership and
//! closes the sink on every exit path, including errors and unwinding.

use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::actuation;
use crate::config::RigConfig;
use crate::error::SinkError;
use crate::ids::ChannelId;

/// Command interface of a servo controller.
pub trait ServoSink {
    /// Set the target of `channel` in controller units.
    fn set_target(&mut self, channel: ChannelId, target: u16) -> Result<(), SinkError>;

    /// Limit the speed at which the controller moves `channel` toward its target.
    fn set_speed(&mut self, channel: ChannelId, speed: u16) -> Result<(), SinkError>;

    /// Limit the acceleration of `channel`.
    fn set_accel(&mut self, channel: ChannelId, accel: u16) -> Result<(), SinkError>;

    /// Release the connection. Further writes should fail with [`SinkError::Closed`].
    fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Reject `channel` up front if the device cannot address it or cannot
    /// represent targets up to `max_target`. Called before any motion.
    fn check_target_range(&self, channel: ChannelId, max_target: u16) -> Result<(), SinkError> {
        let _ = (channel, max_target);
        Ok(())
    }
}

impl<S: ServoSink + ?Sized> ServoSink for &mut S {
    fn set_target(&mut self, channel: ChannelId, target: u16) -> Result<(), SinkError> {
        (**self).set_target(channel, target)
    }

    fn set_speed(&mut self, channel: ChannelId, speed: u16) -> Result<(), SinkError> {
        (**self).set_speed(channel, speed)
    }

    fn set_accel(&mut self, channel: ChannelId, accel: u16) -> Result<(), SinkError> {
        (**self).set_accel(channel, accel)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        (**self).close()
    }

    fn check_target_range(&self, channel: ChannelId, max_target: u16) -> Result<(), SinkError> {
        (**self).check_target_range(channel, max_target)
    }
}

impl<S: ServoSink + ?Sized> ServoSink for Box<S> {
    fn set_target(&mut self, channel: ChannelId, target: u16) -> Result<(), SinkError> {
        (**self).set_target(channel, target)
    }

    fn set_speed(&mut self, channel: ChannelId, speed: u16) -> Result<(), SinkError> {
        (**self).set_speed(channel, speed)
    }

    fn set_accel(&mut self, channel: ChannelId, accel: u16) -> Result<(), SinkError> {
        (**self).set_accel(channel, accel)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        (**self).close()
    }

    fn check_target_range(&self, channel: ChannelId, max_target: u16) -> Result<(), SinkError> {
        (**self).check_target_range(channel, max_target)
    }
}

/// Push the rig's speed/acceleration limits to the controller.
pub fn apply_tuning<S: ServoSink + ?Sized>(
    sink: &mut S,
    config: &RigConfig,
) -> Result<(), SinkError> {
    for (channel, tuning) in config.tuning() {
        log::debug!(
            "tuning servo {channel}: accel {} speed {}",
            tuning.accel,
            tuning.speed
        );
        sink.set_accel(channel, tuning.accel)?;
        sink.set_speed(channel, tuning.speed)?;
    }
    Ok(())
}

/// Check every configured servo against the sink's limits.
pub fn check_rig<S: ServoSink + ?Sized>(sink: &S, config: &RigConfig) -> Result<(), SinkError> {
    for (channel, range) in config.servos() {
        sink.check_target_range(*channel, actuation::device_command(range.max_pulse()))?;
    }
    Ok(())
}

/// Owns a sink and closes it when dropped.
///
/// Call [`SinkGuard::close`] to observe close errors; on drop they are only logged.
#[derive(Debug)]
pub struct SinkGuard<S: ServoSink> {
    sink: S,
    closed: bool,
}

impl<S: ServoSink> SinkGuard<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            closed: false,
        }
    }

    pub fn close(mut self) -> Result<(), SinkError> {
        self.closed = true;
        self.sink.close()
    }
}

impl<S: ServoSink> Deref for SinkGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.sink
    }
}

impl<S: ServoSink> DerefMut for SinkGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

impl<S: ServoSink> Drop for SinkGuard<S> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        match self.sink.close() {
            Ok(()) => log::debug!("servo sink released"),
            Err(e) => log::warn!("failed to release servo sink: {e}"),
        }
    }
}

/// One write observed by a [`RecordingSink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SinkWrite {
    Target { channel: ChannelId, target: u16 },
    Speed { channel: ChannelId, speed: u16 },
    Accel { channel: ChannelId, accel: u16 },
}

/// In-memory sink: records every write. Used for dry runs and tests.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    writes: Vec<SinkWrite>,
    closed: bool,
    close_count: usize,
    target_count: usize,
    fail_after_targets: Option<usize>,
    max_target: Option<u16>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every `set_target` after the first `n` succeed.
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after_targets: Some(n),
            ..Self::default()
        }
    }

    /// Report targets above `max` as unsupported in
    /// [`ServoSink::check_target_range`].
    pub fn with_max_target(mut self, max: u16) -> Self {
        self.max_target = Some(max);
        self
    }

    pub fn writes(&self) -> &[SinkWrite] {
        &self.writes
    }

    /// Target writes in order.
    pub fn targets(&self) -> impl Iterator<Item = (ChannelId, u16)> + '_ {
        self.writes.iter().filter_map(|w| match *w {
            SinkWrite::Target { channel, target } => Some((channel, target)),
            _ => None,
        })
    }

    pub fn last_target(&self, channel: ChannelId) -> Option<u16> {
        self.targets()
            .filter(|(c, _)| *c == channel)
            .map(|(_, t)| t)
            .last()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close_count(&self) -> usize {
        self.close_count
    }

    fn record(&mut self, write: SinkWrite) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        log::trace!("sink write {write:?}");
        self.writes.push(write);
        Ok(())
    }
}

impl ServoSink for RecordingSink {
    fn set_target(&mut self, channel: ChannelId, target: u16) -> Result<(), SinkError> {
        if let Some(limit) = self.fail_after_targets {
            if self.target_count >= limit {
                return Err(SinkError::Rejected {
                    operation: "set_target",
                    channel,
                    reason: "injected failure".into(),
                });
            }
        }
        self.record(SinkWrite::Target { channel, target })?;
        self.target_count += 1;
        Ok(())
    }

    fn set_speed(&mut self, channel: ChannelId, speed: u16) -> Result<(), SinkError> {
        self.record(SinkWrite::Speed { channel, speed })
    }

    fn set_accel(&mut self, channel: ChannelId, accel: u16) -> Result<(), SinkError> {
        self.record(SinkWrite::Accel { channel, accel })
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.closed = true;
        self.close_count += 1;
        Ok(())
    }

    fn check_target_range(&self, channel: ChannelId, max_target: u16) -> Result<(), SinkError> {
        match self.max_target {
            Some(limit) if max_target > limit => Err(SinkError::Rejected {
                operation: "check_target_range",
                channel,
                reason: format!("target {max_target} exceeds {limit}"),
            }),
            _ => Ok(()),
        }
    }
}
