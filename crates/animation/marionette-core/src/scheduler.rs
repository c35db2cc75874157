//! Fixed-period playback loop.
//!
//! Phases: `NotStarted -> Running -> Finalizing -> Done`, with `Cancelled` as
//! the terminal phase for host-requested stops.
//!
//! [`Scheduler::tick`] is a pure step over an explicit [`PlaybackState`]: given
//! the elapsed playback time it fills the reusable [`TickOutputs`] and returns
//! the next state. [`Scheduler::run`] wraps it with a [`Clock`], writes the
//! commands to a [`ServoSink`] and sleeps out the rest of each tick. Overrunning
//! ticks are not caught up; the next tick simply starts late.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::actuation::{self, ActuationMapper};
use crate::clock::Clock;
use crate::config::DEFAULT_TICK_MS;
use crate::engine::{AnimationEngine, ChannelSample};
use crate::error::PlaybackError;
use crate::outputs::{PlaybackEvent, ServoCommand, TickOutputs};
use crate::sink::ServoSink;

/// Lifecycle of one playback run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackPhase {
    NotStarted,
    Running,
    Finalizing,
    Done,
    Cancelled,
}

impl PlaybackPhase {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotStarted => "not started",
            Self::Running => "running",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

impl fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Transient scheduler state, passed into and returned from every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub phase: PlaybackPhase,
    /// Playback seconds of the last processed tick.
    pub elapsed_time: f64,
    /// Index of the next unfired entry in [`AnimationEngine::keyframe_times`].
    pub next_keyframe: usize,
    pub ticks: u64,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self {
            phase: PlaybackPhase::NotStarted,
            elapsed_time: 0.0,
            next_keyframe: 0,
            ticks: 0,
        }
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new()
    }
}

/// What a completed (or cancelled) run did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSummary {
    pub ticks: u64,
    /// Ticks whose processing took longer than the tick period.
    pub overruns: u64,
    pub keyframes_crossed: usize,
    /// Last command set written (the final pose, or the flushed pose on cancel).
    pub final_targets: Vec<ServoCommand>,
    pub elapsed_time: f64,
    pub cancelled: bool,
}

/// Drives one engine + mapper pair. Borrowing keeps the channel set fixed for
/// the lifetime of the scheduler.
#[derive(Debug)]
pub struct Scheduler<'a> {
    engine: &'a AnimationEngine,
    mapper: &'a ActuationMapper,
    tick_period: Duration,
    samples: Vec<ChannelSample>,
    outputs: TickOutputs,
    last_commands: Vec<ServoCommand>,
}

impl<'a> Scheduler<'a> {
    pub fn new(engine: &'a AnimationEngine, mapper: &'a ActuationMapper) -> Self {
        let n = engine.len();
        Self {
            engine,
            mapper,
            tick_period: Duration::from_millis(DEFAULT_TICK_MS),
            samples: Vec::with_capacity(n),
            outputs: TickOutputs::with_capacity(n),
            last_commands: Vec::with_capacity(n),
        }
    }

    pub fn with_tick_period(mut self, tick_period: Duration) -> Self {
        self.tick_period = tick_period;
        self
    }

    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    /// Outputs of the most recent `start`/`tick`/`cancel` call.
    pub fn outputs(&self) -> &TickOutputs {
        &self.outputs
    }

    /// `NotStarted -> Running`.
    pub fn start(&mut self, state: PlaybackState) -> Result<PlaybackState, PlaybackError> {
        if state.phase != PlaybackPhase::NotStarted {
            return Err(PlaybackError::InvalidState {
                current: state.phase,
                requested: PlaybackPhase::Running,
            });
        }
        self.outputs.clear();
        self.last_commands.clear();
        self.outputs.push_event(PlaybackEvent::Started {
            total_duration: self.engine.total_duration(),
            channels: self.engine.len(),
        });
        log::info!(
            "Playback started: {} channels over {:.2}s ({} tween)",
            self.engine.len(),
            self.engine.total_duration(),
            self.engine.tween()
        );
        Ok(PlaybackState {
            phase: PlaybackPhase::Running,
            ..PlaybackState::new()
        })
    }

    /// Advance one tick at playback time `elapsed_time` (seconds since start).
    ///
    /// While running, all channels are sampled from this one snapshot. Once
    /// `elapsed_time` passes the timeline end (or the timeline is empty) the
    /// tick finalizes instead: it samples exactly at `total_duration` and ends
    /// in `Done`. Terminal and not-started states are returned unchanged.
    pub fn tick(&mut self, state: PlaybackState, elapsed_time: f64) -> PlaybackState {
        self.outputs.clear();
        match state.phase {
            PlaybackPhase::Running => {
                let total = self.engine.total_duration();
                if total <= 0.0 || elapsed_time > total {
                    return self.finalize(PlaybackState {
                        phase: PlaybackPhase::Finalizing,
                        ..state
                    });
                }
                let next_keyframe = self.fire_keyframes(state.next_keyframe, elapsed_time);
                self.emit_at(elapsed_time);
                self.last_commands.clear();
                self.last_commands
                    .extend_from_slice(&self.outputs.commands);
                PlaybackState {
                    elapsed_time,
                    next_keyframe,
                    ticks: state.ticks + 1,
                    ..state
                }
            }
            PlaybackPhase::Finalizing => self.finalize(state),
            PlaybackPhase::NotStarted | PlaybackPhase::Done | PlaybackPhase::Cancelled => state,
        }
    }

    /// Stop between ticks: re-emit the last command set so the rig holds its
    /// last known pose, then end in `Cancelled`.
    pub fn cancel(&mut self, state: PlaybackState) -> PlaybackState {
        self.outputs.clear();
        if state.phase.is_terminal() {
            return state;
        }
        self.outputs
            .commands
            .extend_from_slice(&self.last_commands);
        self.outputs.push_event(PlaybackEvent::Cancelled {
            elapsed_time: state.elapsed_time,
        });
        log::info!("Playback cancelled at t={:.2}s", state.elapsed_time);
        PlaybackState {
            phase: PlaybackPhase::Cancelled,
            ..state
        }
    }

    fn finalize(&mut self, state: PlaybackState) -> PlaybackState {
        let total = self.engine.total_duration();
        // The final sample lands on the last keyframe time; report any
        // crossings the last running tick did not reach.
        let next_keyframe = self.fire_keyframes(state.next_keyframe, total);
        self.emit_at(total);
        self.last_commands.clear();
        self.last_commands
            .extend_from_slice(&self.outputs.commands);

        for i in 0..self.outputs.commands.len() {
            let ServoCommand { channel, target } = self.outputs.commands[i];
            log::info!("Final servo {channel} target: {target}");
            self.outputs
                .push_event(PlaybackEvent::FinalTarget { channel, target });
        }
        let ticks = state.ticks + 1;
        self.outputs.push_event(PlaybackEvent::Completed {
            total_duration: total,
            ticks,
        });
        log::info!("Playback complete after {ticks} ticks");

        PlaybackState {
            phase: PlaybackPhase::Done,
            elapsed_time: total,
            next_keyframe,
            ticks,
        }
    }

    fn emit_at(&mut self, elapsed_time: f64) {
        self.engine.sample_into(elapsed_time, &mut self.samples);
        for s in &self.samples {
            if let Some(target) = self.mapper.command_for(s.channel, s.value) {
                self.outputs.push_command(ServoCommand {
                    channel: s.channel,
                    target,
                });
            }
        }
    }

    fn fire_keyframes(&mut self, mut next: usize, elapsed_time: f64) -> usize {
        let engine = self.engine;
        let times = engine.keyframe_times();
        while next < times.len() && elapsed_time >= times[next] {
            log::info!("Keyframe at t={:.2}s", times[next]);
            self.outputs.push_event(PlaybackEvent::KeyframeCrossed {
                index: next,
                time: times[next],
                elapsed_time,
            });
            next += 1;
        }
        next
    }

    /// Run playback to completion against `sink`.
    ///
    /// Every animated channel is checked against the sink's limits first, so
    /// a rig the device cannot follow fails before any motion. `cancel` is
    /// polled before every tick. Any sink error halts playback
    /// immediately; releasing the sink is left to its owner (see
    /// [`crate::sink::SinkGuard`]).
    pub fn run<C, S>(
        &mut self,
        clock: &mut C,
        sink: &mut S,
        cancel: Option<&AtomicBool>,
    ) -> Result<PlaybackSummary, PlaybackError>
    where
        C: Clock + ?Sized,
        S: ServoSink + ?Sized,
    {
        for channel in self.engine.channel_ids() {
            if let Some(range) = self.mapper.range(channel) {
                sink.check_target_range(channel, actuation::device_command(range.max_pulse()))
                    .map_err(|source| PlaybackError::Device {
                        phase: PlaybackPhase::NotStarted,
                        source,
                    })?;
            }
        }

        let mut state = self.start(PlaybackState::new())?;
        let mut summary = PlaybackSummary::default();
        let start_time = clock.now();

        loop {
            let tick_start = clock.now();

            if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                state = self.cancel(state);
                write_commands(sink, &self.outputs.commands, state.phase)?;
                summary.cancelled = true;
                break;
            }

            let elapsed_time = tick_start.saturating_sub(start_time).as_secs_f64();
            state = self.tick(state, elapsed_time);
            let phase = match state.phase {
                PlaybackPhase::Done => PlaybackPhase::Finalizing,
                other => other,
            };
            write_commands(sink, &self.outputs.commands, phase)?;
            summary.keyframes_crossed += self.outputs.keyframes_crossed();

            if state.phase.is_terminal() {
                break;
            }

            let processing = clock.now().saturating_sub(tick_start);
            if processing < self.tick_period {
                clock.sleep(self.tick_period - processing);
            } else if processing > self.tick_period {
                summary.overruns += 1;
                log::debug!(
                    "tick {} overran: {:?} > {:?}",
                    state.ticks,
                    processing,
                    self.tick_period
                );
            }
        }

        summary.ticks = state.ticks;
        summary.elapsed_time = state.elapsed_time;
        summary.final_targets = self.last_commands.clone();
        Ok(summary)
    }
}

fn write_commands<S: ServoSink + ?Sized>(
    sink: &mut S,
    commands: &[ServoCommand],
    phase: PlaybackPhase,
) -> Result<(), PlaybackError> {
    for cmd in commands {
        sink.set_target(cmd.channel, cmd.target)
            .map_err(|source| PlaybackError::Device { phase, source })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PulseRange, RigConfig};
    use crate::data::Track;
    use crate::ids::ChannelId;
    use crate::tween::Tween;

    fn rig(channels: &[u8]) -> RigConfig {
        channels.iter().fold(RigConfig::new("/dev/null"), |cfg, c| {
            let id = ChannelId(*c);
            cfg.with_servo(id, PulseRange::new(id, 1000.0, 2000.0).unwrap())
        })
    }

    fn setup(tracks: Vec<Track>, channels: &[u8]) -> (AnimationEngine, ActuationMapper) {
        let cfg = rig(channels);
        let engine =
            AnimationEngine::from_tracks(&tracks, |c| cfg.is_configured(c), Tween::Linear)
                .unwrap();
        (engine, ActuationMapper::from_config(&cfg))
    }

    #[test]
    fn tick_before_start_is_a_no_op() {
        let (engine, mapper) = setup(vec![Track::new(ChannelId(0), [(0.0, 0.5)])], &[0]);
        let mut sched = Scheduler::new(&engine, &mapper);
        let state = sched.tick(PlaybackState::new(), 1.0);
        assert_eq!(state, PlaybackState::new());
        assert!(sched.outputs().is_empty());
    }

    #[test]
    fn start_twice_is_rejected() {
        let (engine, mapper) = setup(vec![], &[]);
        let mut sched = Scheduler::new(&engine, &mapper);
        let running = sched.start(PlaybackState::new()).unwrap();
        assert!(matches!(
            sched.start(running),
            Err(PlaybackError::InvalidState {
                current: PlaybackPhase::Running,
                ..
            })
        ));
    }

    #[test]
    fn running_tick_emits_one_command_per_channel() {
        let (engine, mapper) = setup(
            vec![
                Track::new(ChannelId(0), [(0.0, 0.0), (2.0, 1.0)]),
                Track::new(ChannelId(1), [(0.0, 1.0), (2.0, 0.0)]),
            ],
            &[0, 1],
        );
        let mut sched = Scheduler::new(&engine, &mapper);
        let state = sched.start(PlaybackState::new()).unwrap();
        let state = sched.tick(state, 1.0);
        assert_eq!(state.phase, PlaybackPhase::Running);
        assert_eq!(state.ticks, 1);
        assert_eq!(
            sched.outputs().commands,
            vec![
                ServoCommand {
                    channel: ChannelId(0),
                    target: 6000
                },
                ServoCommand {
                    channel: ChannelId(1),
                    target: 6000
                },
            ]
        );
    }

    #[test]
    fn passing_the_end_finalizes_at_total_duration() {
        let (engine, mapper) =
            setup(vec![Track::new(ChannelId(0), [(0.0, 0.0), (2.0, 1.0)])], &[0]);
        let mut sched = Scheduler::new(&engine, &mapper);
        let state = sched.start(PlaybackState::new()).unwrap();
        let state = sched.tick(state, 2.0);
        assert_eq!(state.phase, PlaybackPhase::Running);
        let state = sched.tick(state, 2.013);
        assert_eq!(state.phase, PlaybackPhase::Done);
        assert_eq!(state.elapsed_time, 2.0);
        assert_eq!(sched.outputs().commands[0].target, 8000);
        assert!(sched.outputs().events.contains(&PlaybackEvent::FinalTarget {
            channel: ChannelId(0),
            target: 8000
        }));
    }

    #[test]
    fn cancel_replays_last_commands() {
        let (engine, mapper) =
            setup(vec![Track::new(ChannelId(0), [(0.0, 0.0), (2.0, 1.0)])], &[0]);
        let mut sched = Scheduler::new(&engine, &mapper);
        let state = sched.start(PlaybackState::new()).unwrap();
        let state = sched.tick(state, 0.5);
        let state = sched.cancel(state);
        assert_eq!(state.phase, PlaybackPhase::Cancelled);
        assert_eq!(
            sched.outputs().commands,
            vec![ServoCommand {
                channel: ChannelId(0),
                target: 5000
            }]
        );
        // Terminal states stay put.
        assert_eq!(sched.tick(state, 5.0), state);
    }
}
