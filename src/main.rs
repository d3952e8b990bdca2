use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use twodot_experiment::{ExperimentConfig, Timeline, TrialRegistry};

mod app;
mod player;
use app::App;

const DEFAULT_CONFIG: &str = "experiment.json";

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = ExperimentConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    // RUST_LOG wins over the configured filter.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("installing tracing subscriber")?;

    let registry = TrialRegistry::standard();
    let timeline = Timeline::load(&config.timeline_path, &registry)
        .with_context(|| format!("loading timeline {}", config.timeline_path.display()))?;
    info!(
        "Session: {} trials, assets in {}",
        timeline.len(),
        config.assets_dir.display()
    );

    App::new(config, timeline).run()
}
