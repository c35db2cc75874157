use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use marionette_core::{
    ActuationMapper, AnimationEngine, ChannelId, Clock, KeyframeSet, ManualClock, PlaybackError,
    PlaybackEvent, PlaybackPhase, PlaybackState, RecordingSink, RigConfig, Scheduler,
    ServoCommand, SinkError, SinkGuard, Tween,
};
use marionette_test_fixtures as fixtures;

struct Rig {
    engine: AnimationEngine,
    mapper: ActuationMapper,
    tick_period: Duration,
}

fn setup(rig: &str, animation: &str) -> Rig {
    let config = RigConfig::from_json_str(&fixtures::rigs::json(rig).unwrap()).unwrap();
    let keyframes =
        KeyframeSet::from_json_str(&fixtures::animations::json(animation).unwrap()).unwrap();
    Rig {
        engine: AnimationEngine::build(&keyframes, &config, config.playback.tween).unwrap(),
        mapper: ActuationMapper::from_config(&config),
        tick_period: config.playback.tick_period,
    }
}

impl Rig {
    fn scheduler(&self) -> Scheduler<'_> {
        Scheduler::new(&self.engine, &self.mapper).with_tick_period(self.tick_period)
    }
}

/// Raises `flag` once the given number of sleeps have happened.
struct CancelAfterSleeps<'a> {
    inner: ManualClock,
    remaining: usize,
    flag: &'a AtomicBool,
}

impl Clock for CancelAfterSleeps<'_> {
    fn now(&self) -> Duration {
        self.inner.now()
    }

    fn sleep(&mut self, duration: Duration) {
        self.inner.sleep(duration);
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.flag.store(true, Ordering::Relaxed);
        }
    }
}

#[test]
fn sweep_runs_at_a_fixed_period_and_lands_on_the_final_pose() {
    let rig = setup("pan-tilt", "sweep");
    let mut clock = ManualClock::new();
    let mut sink = RecordingSink::new();

    let summary = rig.scheduler().run(&mut clock, &mut sink, None).unwrap();

    // 0.00s..=2.00s running, then one finalizing tick.
    assert_eq!(summary.ticks, 202);
    assert_eq!(summary.overruns, 0);
    assert!(!summary.cancelled);
    assert_eq!(summary.elapsed_time, 2.0);
    assert_eq!(summary.keyframes_crossed, 2);

    let sleeps = clock.sleeps();
    assert_eq!(sleeps.len(), 201);
    assert!(sleeps.iter().all(|d| *d == Duration::from_millis(10)));

    let targets: Vec<u16> = sink.targets().map(|(_, t)| t).collect();
    assert_eq!(targets.len(), 202);
    assert_eq!(targets[0], 4000);
    assert_eq!(targets[100], 6000);
    assert!(targets.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(sink.last_target(ChannelId(0)), Some(8000));
    assert_eq!(
        summary.final_targets,
        vec![ServoCommand {
            channel: ChannelId(0),
            target: 8000
        }]
    );
}

#[test]
fn every_tick_addresses_every_channel_in_order() {
    let rig = setup("pan-tilt", "nod");
    let mut clock = ManualClock::new();
    let mut sink = RecordingSink::new();

    let summary = rig.scheduler().run(&mut clock, &mut sink, None).unwrap();

    let targets: Vec<(ChannelId, u16)> = sink.targets().collect();
    assert_eq!(targets.len() as u64, summary.ticks * 2);
    for pair in targets.chunks(2) {
        assert_eq!(pair[0].0, ChannelId(0));
        assert_eq!(pair[1].0, ChannelId(1));
    }
    // Channel 0 returns to 0.5 (1500us), channel 1 ends at 1.0 (1800us).
    assert_eq!(sink.last_target(ChannelId(0)), Some(6000));
    assert_eq!(sink.last_target(ChannelId(1)), Some(7200));
}

#[test]
fn processing_time_is_subtracted_from_the_sleep() {
    let rig = setup("pan-tilt", "sweep");
    let mut clock = ManualClock::with_cost_per_read(Duration::from_millis(4));
    let mut sink = RecordingSink::new();

    let summary = rig.scheduler().run(&mut clock, &mut sink, None).unwrap();

    assert_eq!(summary.overruns, 0);
    let sleeps = clock.sleeps();
    assert!(!sleeps.is_empty());
    assert!(sleeps.iter().all(|d| *d == Duration::from_millis(6)));
    assert_eq!(sink.last_target(ChannelId(0)), Some(8000));
}

#[test]
fn overrunning_ticks_skip_the_sleep_and_still_finish() {
    let rig = setup("pan-tilt", "sweep");
    let mut clock = ManualClock::with_cost_per_read(Duration::from_millis(15));
    let mut sink = RecordingSink::new();

    let summary = rig.scheduler().run(&mut clock, &mut sink, None).unwrap();

    assert!(clock.sleeps().is_empty());
    // The finalizing tick breaks out before it is measured.
    assert_eq!(summary.overruns, summary.ticks - 1);
    assert!(summary.ticks < 202);
    assert_eq!(sink.last_target(ChannelId(0)), Some(8000));
}

#[test]
fn empty_keyframes_finish_in_one_tick_without_writes() {
    let rig = setup("pan-tilt", "empty");
    let mut clock = ManualClock::new();
    let mut sink = RecordingSink::new();

    let summary = rig.scheduler().run(&mut clock, &mut sink, None).unwrap();

    assert_eq!(summary.ticks, 1);
    assert!(summary.final_targets.is_empty());
    assert!(sink.writes().is_empty());
    assert!(clock.sleeps().is_empty());
}

#[test]
fn single_instant_keyframes_write_one_command_per_channel() {
    let rig = setup("two-servo-defaults", "single-instant");
    let mut clock = ManualClock::new();
    let mut sink = RecordingSink::new();

    let summary = rig.scheduler().run(&mut clock, &mut sink, None).unwrap();

    assert_eq!(summary.ticks, 1);
    assert_eq!(summary.keyframes_crossed, 1);
    // 992 + 1008 * 0.75 = 1748us, 992 + 1008 * 0.25 = 1244us.
    assert_eq!(
        sink.targets().collect::<Vec<_>>(),
        vec![(ChannelId(0), 6992), (ChannelId(1), 4976)]
    );
}

#[test]
fn unconfigured_channels_never_reach_the_sink() {
    let rig = setup("pan-tilt", "stray-channel");
    let mut clock = ManualClock::new();
    let mut sink = RecordingSink::new();

    let summary = rig.scheduler().run(&mut clock, &mut sink, None).unwrap();

    assert_eq!(summary.elapsed_time, 1.0);
    assert!(sink.targets().all(|(c, _)| c == ChannelId(0)));
}

#[test]
fn sink_failure_halts_playback_and_the_guard_releases_the_sink() {
    let rig = setup("pan-tilt", "nod");
    let mut clock = ManualClock::new();
    let mut sink = RecordingSink::failing_after(3);

    let result = {
        let mut guard = SinkGuard::new(&mut sink);
        rig.scheduler().run(&mut clock, &mut *guard, None)
    };

    match result {
        Err(PlaybackError::Device {
            phase: PlaybackPhase::Running,
            source: SinkError::Rejected { channel, .. },
        }) => assert_eq!(channel, ChannelId(1)),
        other => panic!("expected a device error, got {other:?}"),
    }
    assert_eq!(sink.targets().count(), 3);
    assert!(sink.is_closed());
    // Halted after the second tick: one sleep in between.
    assert_eq!(clock.sleeps().len(), 1);
}

#[test]
fn cancellation_before_the_first_tick_writes_nothing() {
    let rig = setup("pan-tilt", "sweep");
    let mut clock = ManualClock::new();
    let mut sink = RecordingSink::new();
    let cancel = AtomicBool::new(true);

    let summary = rig
        .scheduler()
        .run(&mut clock, &mut sink, Some(&cancel))
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.ticks, 0);
    assert!(sink.writes().is_empty());
}

#[test]
fn cancellation_mid_run_holds_the_last_pose() {
    let rig = setup("pan-tilt", "sweep");
    let cancel = AtomicBool::new(false);
    let mut clock = CancelAfterSleeps {
        inner: ManualClock::new(),
        remaining: 5,
        flag: &cancel,
    };
    let mut sink = RecordingSink::new();

    let summary = rig
        .scheduler()
        .run(&mut clock, &mut sink, Some(&cancel))
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.ticks, 5);
    let targets: Vec<u16> = sink.targets().map(|(_, t)| t).collect();
    assert_eq!(targets.len(), 6);
    assert_eq!(targets[4], targets[5]);
    assert_eq!(
        summary.final_targets,
        vec![ServoCommand {
            channel: ChannelId(0),
            target: targets[5]
        }]
    );
    // Never reached the end of the 2s timeline.
    assert!(targets[5] < 8000);
}

#[test]
fn keyframe_events_fire_once_in_order() {
    let rig = setup("pan-tilt", "nod");
    let mut sched = rig.scheduler();

    let crossed = |sched: &Scheduler<'_>| -> Vec<(usize, f64)> {
        sched
            .outputs()
            .events
            .iter()
            .filter_map(|e| match *e {
                PlaybackEvent::KeyframeCrossed { index, time, .. } => Some((index, time)),
                _ => None,
            })
            .collect()
    };

    let state = sched.start(PlaybackState::new()).unwrap();
    let state = sched.tick(state, 0.0);
    assert_eq!(crossed(&sched), vec![(0, 0.0)]);

    let state = sched.tick(state, 0.1);
    assert!(crossed(&sched).is_empty());

    // One late tick crosses two keyframe times.
    let state = sched.tick(state, 0.6);
    assert_eq!(crossed(&sched), vec![(1, 0.25), (2, 0.5)]);

    let state = sched.tick(state, 0.7);
    assert!(crossed(&sched).is_empty());

    let state = sched.tick(state, 1.05);
    assert_eq!(state.phase, PlaybackPhase::Done);
    assert_eq!(crossed(&sched), vec![(3, 1.0)]);
    assert_eq!(state.next_keyframe, 4);
}

#[test]
fn explicit_tween_overrides_the_rig_default() {
    let config = RigConfig::from_json_str(&fixtures::rigs::json("pan-tilt").unwrap()).unwrap();
    let keyframes =
        KeyframeSet::from_json_str(&fixtures::animations::json("sweep").unwrap()).unwrap();
    let linear = AnimationEngine::build(&keyframes, &config, Tween::Linear).unwrap();
    let eased = AnimationEngine::build(&keyframes, &config, Tween::EaseInOutCubic).unwrap();

    // Same end points, slower start.
    assert_eq!(eased.sample(0.0), linear.sample(0.0));
    assert_eq!(eased.sample(2.0), linear.sample(2.0));
    assert!(eased.sample(0.2)[&ChannelId(0)] < linear.sample(0.2)[&ChannelId(0)]);
}

#[test]
fn sink_limits_are_checked_before_the_first_tick() {
    let rig = setup("pan-tilt", "sweep");
    let mut clock = ManualClock::new();
    // Channel 0 reaches 2000us -> 8000.
    let mut sink = RecordingSink::new().with_max_target(7999);

    let result = rig.scheduler().run(&mut clock, &mut sink, None);

    assert!(matches!(
        result,
        Err(PlaybackError::Device {
            phase: PlaybackPhase::NotStarted,
            source: SinkError::Rejected {
                channel: ChannelId(0),
                ..
            },
        })
    ));
    assert!(sink.writes().is_empty());
    assert!(clock.sleeps().is_empty());

    let mut roomy = RecordingSink::new().with_max_target(8000);
    assert!(rig.scheduler().run(&mut clock, &mut roomy, None).is_ok());
}
