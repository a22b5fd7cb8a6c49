//! leap_throw: command-line entry point.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use leap_throw::app::{run, AppConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Grab an object with your hand, fling it, tap the target.
#[derive(Debug, Parser)]
#[command(name = "leap_throw", version, about)]
struct Cli {
    /// TOML config file; missing keys keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Release speed threshold (units/s).
    #[arg(long)]
    threshold: Option<f32>,

    /// Multiplier applied to the drag velocity on release.
    #[arg(long)]
    launch_multiplier: Option<f32>,

    /// Log filter, e.g. `debug` or `grab_throw=trace`.  Overrides RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,

    /// Make the simulated tracking session refuse to start.
    #[arg(long)]
    fail_session: bool,

    /// Do not open a MIDI output for the tap chord.
    #[arg(long)]
    no_midi: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level).context("invalid --log-level")?,
        None        => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║          Leap Throw - grab, fling and tap with hands         ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    #[cfg(feature = "leap")]
    println!("  Mode: LeapMotion hardware");
    #[cfg(not(feature = "leap"))]
    println!("  Mode: Keyboard simulation  (use --features leap for hardware)");
    println!();

    let mut cfg = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None       => AppConfig::default(),
    };
    if let Some(t) = cli.threshold {
        cfg.throw.release_threshold = t;
    }
    if let Some(m) = cli.launch_multiplier {
        cfg.throw.launch_multiplier = m;
    }
    cfg.fail_session |= cli.fail_session;
    cfg.midi &= !cli.no_midi;
    cfg.throw.validate().context("invalid settings")?;

    info!(
        threshold = cfg.throw.release_threshold,
        multiplier = cfg.throw.launch_multiplier,
        midi = cfg.midi,
        "starting"
    );
    run(cfg)
}
