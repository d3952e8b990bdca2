use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;
use twodot_core::TrialError;

/// What the runner does with a trial whose spec fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidTrialPolicy {
    #[default]
    Skip,
    Abort,
}

/// Where clips are played. `Silent` keeps the timing of a clip without
/// opening an output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioOutput {
    #[default]
    Device,
    Silent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub assets_dir: PathBuf,
    pub timeline_path: PathBuf,
    pub results_path: Option<PathBuf>,
    pub invalid_trial_policy: InvalidTrialPolicy,
    pub playback_rate: f64,
    pub audio_output: AudioOutput,
    pub marker_radius_px: f32,
    pub log_filter: String,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
            timeline_path: PathBuf::from("assets/timeline.json"),
            results_path: Some(PathBuf::from("experiment_results.json")),
            invalid_trial_policy: InvalidTrialPolicy::Skip,
            playback_rate: 1.0,
            audio_output: AudioOutput::Device,
            marker_radius_px: 20.0,
            log_filter: "info".to_string(),
        }
    }
}

impl ExperimentConfig {
    /// Reads a JSON config. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, TrialError> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, TrialError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| TrialError::Config(e.to_string()))?;
        if !(config.playback_rate.is_finite() && config.playback_rate > 0.0) {
            return Err(TrialError::Config(format!(
                "playback_rate must be positive, got {}",
                config.playback_rate
            )));
        }
        Ok(config)
    }
}
