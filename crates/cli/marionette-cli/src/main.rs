//! Marionette - keyframed servo playback
//!
//! Loads a rig config and a keyframe file, connects to a Pololu Maestro and
//! plays the animation at a fixed tick rate. Ctrl-C stops playback between
//! ticks and leaves the servos at their last pose.

mod app;
mod args;

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use crate::args::Args;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
        log::warn!("Ctrl-C handler not installed: {e}");
    }

    match app::run(&args, &cancel) {
        Ok(summary) => {
            if summary.cancelled {
                log::info!("Animation cancelled after {} ticks.", summary.ticks);
            } else {
                log::info!(
                    "Animation complete: {} ticks, {} overruns.",
                    summary.ticks,
                    summary.overruns
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
