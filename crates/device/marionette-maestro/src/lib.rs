//! Pololu Maestro driver for Marionette.
//!
//! [`Maestro`] speaks the Pololu serial protocol over any `Read + Write`
//! stream and implements [`marionette_core::ServoSink`]. [`Maestro::open`]
//! connects through a serial port.

pub mod controller;
pub mod error;
pub mod protocol;

pub use controller::{Maestro, SerialMaestro, TargetLimits, DEFAULT_TIMEOUT};
pub use error::MaestroError;
pub use protocol::{Command, Frame, DEFAULT_DEVICE};
