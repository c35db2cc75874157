//! Marionette core (device-agnostic)
//!
//! Turns sparse per-channel keyframe tracks into a synchronized, fixed-rate
//! stream of servo commands. The crate owns the data model (keyframes, rig
//! configuration), the interpolation and tweening math, the animation engine,
//! the pulse-width mapping and the playback scheduler. Device drivers plug in
//! through [`ServoSink`].

pub mod actuation;
pub mod clock;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod ids;
pub mod interp;
pub mod outputs;
pub mod scheduler;
pub mod sink;
pub mod tween;

// Re-exports for consumers (drivers, CLI)
pub use actuation::ActuationMapper;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{PlaybackSettings, PulseRange, RigConfig, ServoTuning};
pub use data::{Keyframe, KeyframeSet, Track};
pub use engine::{AnimationEngine, ChannelSample};
pub use error::{AnimationError, PlaybackError, SinkError};
pub use ids::ChannelId;
pub use interp::ChannelInterpolator;
pub use outputs::{PlaybackEvent, ServoCommand, TickOutputs};
pub use scheduler::{PlaybackPhase, PlaybackState, PlaybackSummary, Scheduler};
pub use sink::{apply_tuning, check_rig, RecordingSink, ServoSink, SinkGuard, SinkWrite};
pub use tween::Tween;
