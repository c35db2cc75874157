use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use marionette_core::Tween;
use marionette_maestro::DEFAULT_DEVICE;

/// Play a keyframed animation on a servo rig
#[derive(Parser, Debug)]
#[command(name = "marionette")]
#[command(about = "Play keyframed servo animations on a Pololu Maestro")]
#[command(version)]
pub struct Args {
    /// Rig configuration (servo pulse ranges, port, tuning)
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Keyframe file: {"<channel>": [[time, position], ...]}
    #[arg(short, long, default_value = "keyframes.json")]
    pub keyframes: PathBuf,

    /// Serial port, overriding the rig config
    #[arg(short, long)]
    pub port: Option<String>,

    /// Baud rate, overriding the rig config
    #[arg(long)]
    pub baud: Option<u32>,

    /// Timeline curve: linear, ease_in_out_quad or ease_in_out_cubic
    #[arg(short, long, value_parser = Tween::from_str)]
    pub tween: Option<Tween>,

    /// Tick period in milliseconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_ms: Option<u64>,

    /// Play against an in-memory sink instead of the controller
    #[arg(long)]
    pub dry_run: bool,

    /// Maestro device number (Pololu protocol)
    #[arg(long, default_value_t = DEFAULT_DEVICE)]
    pub device: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_conventional_file_names() {
        let args = Args::try_parse_from(["marionette"]).unwrap();
        assert_eq!(args.config, PathBuf::from("config.json"));
        assert_eq!(args.keyframes, PathBuf::from("keyframes.json"));
        assert_eq!(args.device, 0x0C);
        assert!(args.tween.is_none());
        assert!(!args.dry_run);
    }

    #[test]
    fn overrides_parse() {
        let args = Args::try_parse_from([
            "marionette",
            "--port",
            "/dev/ttyUSB1",
            "--tween",
            "ease-in-out-cubic",
            "--tick-ms",
            "20",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(args.port.as_deref(), Some("/dev/ttyUSB1"));
        assert_eq!(args.tween.map(|t| t.name()), Some("ease_in_out_cubic"));
        assert_eq!(args.tick_ms, Some(20));
        assert!(args.dry_run);
    }

    #[test]
    fn unknown_tween_and_zero_tick_are_rejected() {
        assert!(Args::try_parse_from(["marionette", "--tween", "bounce"]).is_err());
        assert!(Args::try_parse_from(["marionette", "--tick-ms", "0"]).is_err());
    }
}
