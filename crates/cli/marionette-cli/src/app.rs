use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::{Context, Result};
use marionette_core::{
    apply_tuning, check_rig, ActuationMapper, AnimationEngine, KeyframeSet, MonotonicClock,
    PlaybackSummary, RecordingSink, RigConfig, Scheduler, ServoSink, SinkGuard,
};
use marionette_maestro::Maestro;

use crate::args::Args;

/// Load the rig config and apply command-line overrides.
pub fn load_config(args: &Args) -> Result<RigConfig> {
    let mut config = RigConfig::load(&args.config)
        .with_context(|| format!("failed to load rig config {}", args.config.display()))?;
    if let Some(port) = &args.port {
        config.port = port.clone();
    }
    if let Some(baud) = args.baud {
        config.baud = baud;
    }
    if let Some(tween) = args.tween {
        config.playback.tween = tween;
    }
    if let Some(ms) = args.tick_ms {
        config.playback.tick_period = Duration::from_millis(ms);
    }
    Ok(config)
}

/// Load, connect, tune and play. The controller is released on every path.
pub fn run(args: &Args, cancel: &AtomicBool) -> Result<PlaybackSummary> {
    let config = load_config(args)?;
    let keyframes = KeyframeSet::load(&args.keyframes)
        .with_context(|| format!("failed to load keyframes {}", args.keyframes.display()))?;

    let engine = AnimationEngine::build(&keyframes, &config, config.playback.tween)
        .context("invalid keyframes")?;
    let mapper = ActuationMapper::from_config(&config);
    let mut scheduler =
        Scheduler::new(&engine, &mapper).with_tick_period(config.playback.tick_period);

    if args.dry_run {
        let mut sink = RecordingSink::new();
        let summary = play(&mut scheduler, &config, &mut sink, cancel)?;
        log::info!(
            "Dry run wrote {} targets across {} ticks",
            sink.targets().count(),
            summary.ticks
        );
        return Ok(summary);
    }

    let maestro = Maestro::open(&config.port, config.baud)
        .context("Check if the Maestro controller is connected and the port is correct")?
        .with_device(args.device)?;
    play(&mut scheduler, &config, maestro, cancel)
}

fn play<S: ServoSink>(
    scheduler: &mut Scheduler<'_>,
    config: &RigConfig,
    sink: S,
    cancel: &AtomicBool,
) -> Result<PlaybackSummary> {
    let mut guard = SinkGuard::new(sink);
    check_rig(&*guard, config).context("rig exceeds the servo controller's limits")?;
    apply_tuning(&mut *guard, config).context("failed to apply servo tuning")?;

    log::info!(
        "Starting animation with {} curve...",
        config.playback.tween
    );
    let summary = scheduler.run(&mut MonotonicClock::new(), &mut *guard, Some(cancel))?;

    guard
        .close()
        .context("failed to release the servo controller")?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use marionette_core::{ChannelId, Tween};
    use marionette_test_fixtures as fixtures;

    fn args(rig: &str, animation: &str, extra: &[&str]) -> Args {
        let config = fixtures::rigs::path(rig).unwrap();
        let keyframes = fixtures::animations::path(animation).unwrap();
        let mut argv = vec![
            "marionette".to_string(),
            "--config".to_string(),
            config.display().to_string(),
            "--keyframes".to_string(),
            keyframes.display().to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn flags_override_the_rig_config() {
        let a = args(
            "pan-tilt",
            "nod",
            &["--port", "/dev/ttyUSB3", "--tween", "ease_in_out_cubic", "--tick-ms", "25"],
        );
        let config = load_config(&a).unwrap();
        assert_eq!(config.port, "/dev/ttyUSB3");
        assert_eq!(config.playback.tick_period, Duration::from_millis(25));
        assert_eq!(config.playback.tween.name(), Tween::EaseInOutCubic.name());
        assert!(config.is_configured(ChannelId(1)));
    }

    #[test]
    fn dry_run_plays_a_degenerate_timeline() {
        let a = args("two-servo-defaults", "single-instant", &["--dry-run"]);
        let summary = run(&a, &AtomicBool::new(false)).unwrap();
        assert_eq!(summary.ticks, 1);
        assert_eq!(summary.final_targets.len(), 2);
    }

    #[test]
    fn missing_files_carry_their_path() {
        let mut a = args("pan-tilt", "nod", &["--dry-run"]);
        a.keyframes = "does/not/exist.json".into();
        let err = run(&a, &AtomicBool::new(false)).unwrap_err();
        assert!(format!("{err:#}").contains("does/not/exist.json"));
    }

    #[test]
    fn unreachable_port_fails_before_playback() {
        let a = args(
            "pan-tilt",
            "single-instant",
            &["--port", "/nonexistent/marionette-tty"],
        );
        let err = run(&a, &AtomicBool::new(false)).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/marionette-tty"));
    }
}
