mod cli;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Args;
use flanker_app::WinitDisplay;
use flanker_experiment::session::build_stimuli;
use flanker_experiment::{ExperimentConfig, Session, SessionEnd};
use flanker_render::{RenderSettings, load_font};
use flanker_timing::MonotonicClock;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn main() -> Result<()> {
    let args = Args::parse();
    let config = ExperimentConfig::load(&args.config)?;
    let _guard = logging::init(&config.results_dir, &args.participant);

    tracing::info!(
        participant = %args.participant,
        config = %args.config.display(),
        os = std::env::consts::OS,
        trials = config.total_trials(),
        "starting flanker task"
    );

    if let Err(e) = run(args, config) {
        tracing::error!(error = %format!("{e:#}"), "flanker task failed");
        return Err(e);
    }
    Ok(())
}

fn run(args: Args, config: ExperimentConfig) -> Result<()> {
    config.check_assets()?;

    let seed = args.seed.unwrap_or_else(rand::random);
    tracing::info!(seed, "trial randomization seeded");

    let settings = RenderSettings {
        background: config.background_color,
        pixels_per_degree: config.pixels_per_degree,
    };
    let font = load_font(&config.font_path)?;
    let (mut display, keyboard) = WinitDisplay::open(settings, font)?;

    let stimuli = build_stimuli(&config);
    display
        .preload([&stimuli.background, &stimuli.cue].into_iter().chain(&stimuli.cars))
        .context("failed to load stimuli")?;
    if let Some(hz) = display.refresh_rate() {
        tracing::info!(reported_hz = hz, expected_hz = config.frame_rate, "monitor refresh rate");
    }

    let mut session = Session::new(
        config,
        args.participant,
        display,
        keyboard,
        MonotonicClock::new(),
        StdRng::seed_from_u64(seed),
    );

    if args.skip_frame_check {
        tracing::warn!("frame-rate check skipped");
    } else {
        session.check_frame_rate()?;
    }

    match session.run()? {
        SessionEnd::Completed => tracing::info!("experiment finished"),
        SessionEnd::Aborted => tracing::warn!("experiment aborted by participant"),
    }
    if let Some(path) = session.results().path() {
        tracing::info!(path = %path.display(), "results written");
    }
    Ok(())
}
