use std::path::PathBuf;

use twodot_audio::DevicePlayer;
use twodot_core::{Clip, MediaPlayer, ResourceRef, TrialError, TrialEvent};
use twodot_experiment::AudioOutput;
use twodot_timing::{ClockedPlayer, HighPrecisionTimer};

/// The player a session runs with, chosen by `audio_output`.
pub enum SessionPlayer {
    Device(DevicePlayer),
    Silent(ClockedPlayer<HighPrecisionTimer>),
}

impl SessionPlayer {
    pub fn new(
        output: AudioOutput,
        assets_dir: impl Into<PathBuf>,
        timer: &HighPrecisionTimer,
        rate: f64,
    ) -> Self {
        match output {
            AudioOutput::Device => Self::Device(DevicePlayer::new(assets_dir).with_rate(rate)),
            AudioOutput::Silent => {
                Self::Silent(ClockedPlayer::new(assets_dir, timer.clone()).with_rate(rate))
            }
        }
    }

    pub fn poll(&mut self) -> Vec<TrialEvent> {
        match self {
            Self::Device(p) => p.poll(),
            Self::Silent(p) => p.poll(),
        }
    }
}

impl MediaPlayer for SessionPlayer {
    fn play(&mut self, clip: Clip, source: &ResourceRef) -> Result<(), TrialError> {
        match self {
            Self::Device(p) => p.play(clip, source),
            Self::Silent(p) => p.play(clip, source),
        }
    }

    fn stop(&mut self) {
        match self {
            Self::Device(p) => p.stop(),
            Self::Silent(p) => p.stop(),
        }
    }
}
