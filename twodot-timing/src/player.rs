use std::path::{Path, PathBuf};

use tracing::{debug, info};
use twodot_core::{Clip, MediaPlayer, ResourceRef, TrialError, TrialEvent};

use crate::Timer;

#[derive(Debug, Clone)]
struct Playback {
    clip: Clip,
    started_at: u64,
    duration_seconds: f64,
    ended: bool,
}

/// Media primitive that resolves WAV clips on disk and reports their
/// playback position from a `Timer`.
///
/// The host calls `poll` once per frame and forwards the events to the
/// running trial. Positions are media time, so the reported timecodes stay
/// comparable to the trial's choice windows whatever `rate` is.
#[derive(Debug, Clone)]
pub struct ClockedPlayer<T: Timer<Timestamp = u64>> {
    assets_dir: PathBuf,
    timer: T,
    rate: f64,
    current: Option<Playback>,
}

impl<T: Timer<Timestamp = u64>> ClockedPlayer<T> {
    pub fn new(assets_dir: impl Into<PathBuf>, timer: T) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            timer,
            rate: 1.0,
            current: None,
        }
    }

    /// Non-positive or non-finite rates fall back to 1.0.
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
        self
    }

    pub fn is_playing(&self) -> bool {
        self.current.as_ref().is_some_and(|p| !p.ended)
    }

    pub fn current_clip(&self) -> Option<Clip> {
        self.current.as_ref().map(|p| p.clip)
    }

    /// Samples the current position. Emits one `Progress` per call and a
    /// single `Ended` once the clip has run out.
    pub fn poll(&mut self) -> Vec<TrialEvent> {
        let Some(playback) = self.current.as_mut() else {
            return Vec::new();
        };
        if playback.ended {
            return Vec::new();
        }

        let position = self.timer.elapsed(playback.started_at).as_secs_f64() * self.rate;
        let mut events = vec![TrialEvent::Progress {
            clip: playback.clip,
            position_seconds: position.min(playback.duration_seconds),
        }];
        if position >= playback.duration_seconds {
            playback.ended = true;
            debug!("{:?} clip ended at {:.3}s", playback.clip, position);
            events.push(TrialEvent::Ended(playback.clip));
        }
        events
    }

    fn resolve(&self, source: &ResourceRef) -> PathBuf {
        self.assets_dir.join(source.as_str())
    }
}

impl<T: Timer<Timestamp = u64>> MediaPlayer for ClockedPlayer<T> {
    fn play(&mut self, clip: Clip, source: &ResourceRef) -> Result<(), TrialError> {
        let path = self.resolve(source);
        let duration_seconds =
            clip_duration(&path).map_err(|e| TrialError::media_load(source.as_str(), e))?;

        info!(
            "Playing {:?} clip {} ({:.3}s at x{:.2})",
            clip, source, duration_seconds, self.rate
        );
        self.current = Some(Playback {
            clip,
            started_at: self.timer.now(),
            duration_seconds,
            ended: false,
        });
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(playback) = self.current.take() {
            debug!("Stopped {:?} clip", playback.clip);
        }
    }
}

/// Length of a WAV file in seconds, read from its header.
pub fn clip_duration(path: &Path) -> Result<f64, hound::Error> {
    let reader = hound::WavReader::open(path)?;
    let sample_rate = reader.spec().sample_rate;
    if sample_rate == 0 {
        return Err(hound::Error::FormatError("zero sample rate"));
    }
    Ok(reader.duration() as f64 / sample_rate as f64)
}
