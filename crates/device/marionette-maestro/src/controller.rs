//! Maestro controller over any byte stream.

use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use marionette_core::{ChannelId, ServoSink, SinkError};
use serialport::SerialPort;

use crate::error::MaestroError;
use crate::protocol::{decode_u16, Command, Frame, DEFAULT_DEVICE, MAX_CHANNELS, MAX_VALUE};

/// Serial read timeout for query replies.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Software target limits for one channel, in quarter-microseconds.
/// A bound of 0 is disabled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TargetLimits {
    pub min: u16,
    pub max: u16,
}

impl TargetLimits {
    #[inline]
    pub fn clamp(&self, target: u16) -> u16 {
        let mut t = target;
        if self.min > 0 && t < self.min {
            t = self.min;
        }
        if self.max > 0 && t > self.max {
            t = self.max;
        }
        t
    }
}

/// A Pololu Maestro reached through `port`.
///
/// Tracks the last target sent per channel so [`Maestro::is_moving`] can
/// compare it with the reported position.
pub struct Maestro<T: Read + Write> {
    port: T,
    device: u8,
    targets: [u16; MAX_CHANNELS],
    limits: [TargetLimits; MAX_CHANNELS],
    closed: bool,
}

/// A Maestro on a serial device.
pub type SerialMaestro = Maestro<Box<dyn SerialPort>>;

impl Maestro<Box<dyn SerialPort>> {
    /// Open the controller's command port.
    pub fn open(path: &str, baud: u32) -> Result<Self, SinkError> {
        let port = serialport::new(path, baud)
            .timeout(DEFAULT_TIMEOUT)
            .open()
            .map_err(|e| SinkError::Connect {
                port: path.to_string(),
                reason: e.to_string(),
            })?;
        log::info!("Connected to Maestro controller at {path} ({baud} baud)");
        Ok(Self::new(port))
    }
}

impl<T: Read + Write> Maestro<T> {
    pub fn new(port: T) -> Self {
        Self {
            port,
            device: DEFAULT_DEVICE,
            targets: [0; MAX_CHANNELS],
            limits: [TargetLimits::default(); MAX_CHANNELS],
            closed: false,
        }
    }

    /// Address a controller configured with a non-default device number.
    pub fn with_device(mut self, device: u8) -> Result<Self, MaestroError> {
        if device > 0x7F {
            return Err(MaestroError::DeviceOutOfRange { device });
        }
        self.device = device;
        Ok(self)
    }

    #[inline]
    pub fn device(&self) -> u8 {
        self.device
    }

    /// Clamp future targets on `channel` into `limits`.
    pub fn set_limits(&mut self, channel: u8, limits: TargetLimits) -> Result<(), MaestroError> {
        let slot = self
            .limits
            .get_mut(channel as usize)
            .ok_or(MaestroError::ChannelOutOfRange { channel })?;
        *slot = limits;
        Ok(())
    }

    /// Send a target, clamped to the channel's limits. Returns what was sent.
    pub fn set_target(&mut self, channel: u8, target: u16) -> Result<u16, MaestroError> {
        let limits = self
            .limits
            .get(channel as usize)
            .copied()
            .ok_or(MaestroError::ChannelOutOfRange { channel })?;
        let target = limits.clamp(target);
        let frame = Frame::set_target(self.device, channel, target)?;
        self.send(&frame)?;
        self.targets[channel as usize] = target;
        Ok(target)
    }

    pub fn set_speed(&mut self, channel: u8, speed: u16) -> Result<(), MaestroError> {
        let frame = Frame::set_speed(self.device, channel, speed)?;
        self.send(&frame)
    }

    pub fn set_accel(&mut self, channel: u8, accel: u16) -> Result<(), MaestroError> {
        let frame = Frame::set_accel(self.device, channel, accel)?;
        self.send(&frame)
    }

    /// Current pulse width output on `channel`, in quarter-microseconds.
    pub fn get_position(&mut self, channel: u8) -> Result<u16, MaestroError> {
        let frame = Frame::get_position(self.device, channel)?;
        self.send(&frame)?;
        let reply: [u8; 2] = self.read_reply(Command::GetPosition)?;
        Ok(decode_u16(reply))
    }

    /// True while any servo is still travelling toward its target.
    pub fn get_moving_state(&mut self) -> Result<bool, MaestroError> {
        let frame = Frame::get_moving_state(self.device)?;
        self.send(&frame)?;
        let [state]: [u8; 1] = self.read_reply(Command::GetMovingState)?;
        Ok(state != 0)
    }

    /// Controller error register. Reading it clears it.
    pub fn get_errors(&mut self) -> Result<u16, MaestroError> {
        let frame = Frame::get_errors(self.device)?;
        self.send(&frame)?;
        let reply: [u8; 2] = self.read_reply(Command::GetErrors)?;
        Ok(decode_u16(reply))
    }

    /// Send every channel to its configured home position.
    pub fn go_home(&mut self) -> Result<(), MaestroError> {
        let frame = Frame::go_home(self.device)?;
        self.send(&frame)?;
        self.targets = [0; MAX_CHANNELS];
        Ok(())
    }

    /// Whether `channel` has not yet reached the last target sent to it.
    /// Channels never targeted report `false` without a query.
    pub fn is_moving(&mut self, channel: u8) -> Result<bool, MaestroError> {
        let target = self
            .targets
            .get(channel as usize)
            .copied()
            .ok_or(MaestroError::ChannelOutOfRange { channel })?;
        if target == 0 {
            return Ok(false);
        }
        Ok(self.get_position(channel)? != target)
    }

    /// Last target sent to `channel` (0 if none).
    pub fn last_target(&self, channel: u8) -> Option<u16> {
        self.targets.get(channel as usize).copied()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn into_inner(self) -> T {
        self.port
    }

    fn send(&mut self, frame: &Frame) -> Result<(), MaestroError> {
        if self.closed {
            return Err(MaestroError::Closed);
        }
        let command = frame.command().name();
        log::trace!("maestro tx {frame:?}");
        self.port
            .write_all(frame.as_bytes())
            .and_then(|()| self.port.flush())
            .map_err(|source| MaestroError::Io { command, source })
    }

    fn read_reply<const N: usize>(&mut self, command: Command) -> Result<[u8; N], MaestroError> {
        let mut reply = [0u8; N];
        match self.port.read_exact(&mut reply) {
            Ok(()) => {
                log::trace!("maestro rx {}{:02X?}", command.name(), reply);
                Ok(reply)
            }
            Err(source) if matches!(source.kind(), ErrorKind::UnexpectedEof | ErrorKind::TimedOut) => {
                Err(MaestroError::NoReply {
                    command: command.name(),
                    expected: command.reply_len(),
                    source,
                })
            }
            Err(source) => Err(MaestroError::Io {
                command: command.name(),
                source,
            }),
        }
    }
}

impl<T: Read + Write> fmt::Debug for Maestro<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Maestro")
            .field("device", &self.device)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<T: Read + Write> ServoSink for Maestro<T> {
    fn set_target(&mut self, channel: ChannelId, target: u16) -> Result<(), SinkError> {
        Maestro::set_target(self, channel.0, target)
            .map(|sent| {
                if sent != target {
                    log::debug!("servo {channel} target {target} clamped to {sent}");
                }
            })
            .map_err(|e| e.into_sink_error("set_target", channel))
    }

    fn set_speed(&mut self, channel: ChannelId, speed: u16) -> Result<(), SinkError> {
        Maestro::set_speed(self, channel.0, speed)
            .map_err(|e| e.into_sink_error("set_speed", channel))
    }

    fn set_accel(&mut self, channel: ChannelId, accel: u16) -> Result<(), SinkError> {
        Maestro::set_accel(self, channel.0, accel)
            .map_err(|e| e.into_sink_error("set_accel", channel))
    }

    fn check_target_range(&self, channel: ChannelId, max_target: u16) -> Result<(), SinkError> {
        let err = if channel.index() >= MAX_CHANNELS {
            MaestroError::ChannelOutOfRange { channel: channel.0 }
        } else if max_target > MAX_VALUE {
            MaestroError::ValueOutOfRange {
                command: Command::SetTarget.name(),
                value: max_target,
            }
        } else {
            return Ok(());
        };
        Err(err.into_sink_error("check_target_range", channel))
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.port.flush().map_err(|e| SinkError::io("close", e))?;
        log::info!("Servo controller closed.");
        Ok(())
    }
}
