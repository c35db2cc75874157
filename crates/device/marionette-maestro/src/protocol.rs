//! Pololu protocol framing for Maestro servo controllers.
//!
//! Every request is `0xAA, device, command & 0x7F, payload...`. Fourteen-bit
//! values travel as two 7-bit bytes, low bits first. Replies are raw bytes,
//! little-endian where they carry a 16-bit value.

use crate::error::MaestroError;

/// Start byte of a Pololu protocol frame.
pub const SYNC: u8 = 0xAA;
/// Factory default device number.
pub const DEFAULT_DEVICE: u8 = 0x0C;
/// Largest value a 14-bit payload can carry.
pub const MAX_VALUE: u16 = 0x3FFF;
/// Channel count of the largest Maestro (Mini 24).
pub const MAX_CHANNELS: usize = 24;

const MAX_FRAME_LEN: usize = 6;

/// Maestro serial commands (compact-protocol byte values).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    SetTarget = 0x84,
    SetSpeed = 0x87,
    SetAcceleration = 0x89,
    GetPosition = 0x90,
    GetMovingState = 0x93,
    GetErrors = 0xA1,
    GoHome = 0xA2,
}

impl Command {
    #[inline]
    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Number of reply bytes the controller sends back.
    pub fn reply_len(self) -> usize {
        match self {
            Command::GetPosition | Command::GetErrors => 2,
            Command::GetMovingState => 1,
            _ => 0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::SetTarget => "set_target",
            Command::SetSpeed => "set_speed",
            Command::SetAcceleration => "set_accel",
            Command::GetPosition => "get_position",
            Command::GetMovingState => "get_moving_state",
            Command::GetErrors => "get_errors",
            Command::GoHome => "go_home",
        }
    }
}

/// Split a 14-bit value into `[low 7 bits, high 7 bits]`.
#[inline]
pub fn split_7bit(value: u16) -> [u8; 2] {
    [(value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8]
}

/// Decode a two-byte little-endian reply.
#[inline]
pub fn decode_u16(reply: [u8; 2]) -> u16 {
    u16::from_le_bytes(reply)
}

/// One encoded request.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    command: Command,
    buf: [u8; MAX_FRAME_LEN],
    len: usize,
}

impl Frame {
    fn header(device: u8, command: Command) -> Result<Self, MaestroError> {
        if device > 0x7F {
            return Err(MaestroError::DeviceOutOfRange { device });
        }
        let mut buf = [0u8; MAX_FRAME_LEN];
        buf[0] = SYNC;
        buf[1] = device;
        buf[2] = command.byte() & 0x7F;
        Ok(Self {
            command,
            buf,
            len: 3,
        })
    }

    fn push(&mut self, byte: u8) {
        self.buf[self.len] = byte;
        self.len += 1;
    }

    fn channel(device: u8, command: Command, channel: u8) -> Result<Self, MaestroError> {
        if channel as usize >= MAX_CHANNELS {
            return Err(MaestroError::ChannelOutOfRange { channel });
        }
        let mut frame = Self::header(device, command)?;
        frame.push(channel);
        Ok(frame)
    }

    fn channel_value(
        device: u8,
        command: Command,
        channel: u8,
        value: u16,
    ) -> Result<Self, MaestroError> {
        if value > MAX_VALUE {
            return Err(MaestroError::ValueOutOfRange {
                command: command.name(),
                value,
            });
        }
        let mut frame = Self::channel(device, command, channel)?;
        let [lsb, msb] = split_7bit(value);
        frame.push(lsb);
        frame.push(msb);
        Ok(frame)
    }

    /// Target in quarter-microseconds; 0 stops sending pulses.
    pub fn set_target(device: u8, channel: u8, target: u16) -> Result<Self, MaestroError> {
        Self::channel_value(device, Command::SetTarget, channel, target)
    }

    /// Speed limit in (0.25us)/(10ms); 0 means unlimited.
    pub fn set_speed(device: u8, channel: u8, speed: u16) -> Result<Self, MaestroError> {
        Self::channel_value(device, Command::SetSpeed, channel, speed)
    }

    /// Acceleration limit in (0.25us)/(10ms)/(80ms); 0 means unlimited.
    pub fn set_accel(device: u8, channel: u8, accel: u16) -> Result<Self, MaestroError> {
        Self::channel_value(device, Command::SetAcceleration, channel, accel)
    }

    pub fn get_position(device: u8, channel: u8) -> Result<Self, MaestroError> {
        Self::channel(device, Command::GetPosition, channel)
    }

    pub fn get_moving_state(device: u8) -> Result<Self, MaestroError> {
        Self::header(device, Command::GetMovingState)
    }

    pub fn get_errors(device: u8) -> Result<Self, MaestroError> {
        Self::header(device, Command::GetErrors)
    }

    pub fn go_home(device: u8) -> Result<Self, MaestroError> {
        Self::header(device, Command::GoHome)
    }

    #[inline]
    pub fn command(&self) -> Command {
        self.command
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{:02X?}", self.command.name(), self.as_bytes())
    }
}
