//! Driver errors and their translation to the servo sink boundary.

use marionette_core::{ChannelId, SinkError};

/// Driver-level failures.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum MaestroError {
    #[error("Channel {channel} is outside the controller's 0..24 range")]
    ChannelOutOfRange { channel: u8 },

    #[error("Value {value} does not fit the 14-bit payload of {command}")]
    ValueOutOfRange { command: &'static str, value: u16 },

    #[error("Device number {device} must be below 128")]
    DeviceOutOfRange { device: u8 },

    /// The controller sent fewer reply bytes than the command defines
    #[error("No reply to {command} (expected {expected} bytes)")]
    NoReply {
        command: &'static str,
        expected: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Serial IO error during {command}: {source}")]
    Io {
        command: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Controller is closed")]
    Closed,
}

impl MaestroError {
    /// Translate into the sink-boundary error for a write on `channel`.
    pub fn into_sink_error(self, operation: &'static str, channel: ChannelId) -> SinkError {
        match self {
            MaestroError::Io { source, .. } | MaestroError::NoReply { source, .. } => {
                SinkError::io(operation, source)
            }
            MaestroError::Closed => SinkError::Closed,
            other => SinkError::Rejected {
                operation,
                channel,
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_failures_stay_io_at_the_sink_boundary() {
        let err = MaestroError::Io {
            command: "set_target",
            source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged"),
        };
        assert!(matches!(
            err.into_sink_error("set_target", ChannelId(0)),
            SinkError::Io {
                operation: "set_target",
                ..
            }
        ));
    }

    #[test]
    fn range_failures_become_rejections() {
        let err = MaestroError::ChannelOutOfRange { channel: 30 };
        match err.into_sink_error("set_speed", ChannelId(30)) {
            SinkError::Rejected {
                channel, reason, ..
            } => {
                assert_eq!(channel, ChannelId(30));
                assert!(reason.contains("0..24"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
