use std::path::PathBuf;
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use tracing::{debug, error, info, warn};
use twodot_core::{Clip, MediaPlayer, ResourceRef, TrialError, TrialEvent};

use crate::pcm::{PcmClip, PlaybackBuffer};

struct Active {
    clip: Clip,
    buffer: Arc<PlaybackBuffer>,
    // Dropping the stream stops output.
    _stream: Option<cpal::Stream>,
    ended: bool,
}

/// Plays WAV clips on the default output device.
///
/// Clips are decoded up front, adapted to the device format and streamed
/// from a shared buffer. `poll` reports the media time of the samples
/// handed to the device, then `Ended` once the buffer drains. Device and
/// stream errors surface as `LoadFailed` on the next poll.
pub struct DevicePlayer {
    assets_dir: PathBuf,
    rate: f64,
    current: Option<Active>,
    pending_failure: Option<(Clip, String)>,
}

impl DevicePlayer {
    pub fn new(assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            rate: 1.0,
            current: None,
            pending_failure: None,
        }
    }

    /// Speeds playback up or down (pitch follows). Non-positive or
    /// non-finite rates fall back to 1.0.
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
        self
    }

    pub fn current_clip(&self) -> Option<Clip> {
        self.current.as_ref().map(|a| a.clip)
    }

    pub fn poll(&mut self) -> Vec<TrialEvent> {
        if let Some((clip, reason)) = self.pending_failure.take() {
            return vec![TrialEvent::LoadFailed { clip, reason }];
        }
        let Some(active) = self.current.as_mut() else {
            return Vec::new();
        };
        if active.ended {
            return Vec::new();
        }

        if let Some(reason) = active.buffer.failure() {
            active.ended = true;
            let clip = active.clip;
            self.current = None;
            return vec![TrialEvent::LoadFailed { clip, reason }];
        }

        let mut events = vec![TrialEvent::Progress {
            clip: active.clip,
            position_seconds: active.buffer.position_seconds(),
        }];
        if active.buffer.is_drained() {
            active.ended = true;
            debug!("{:?} clip drained", active.clip);
            events.push(TrialEvent::Ended(active.clip));
        }
        events
    }

    fn open(&self, pcm: &PcmClip) -> Result<(cpal::Stream, Arc<PlaybackBuffer>), String> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| "no output device available".to_string())?;
        let supported = device.default_output_config().map_err(|e| e.to_string())?;
        let config: cpal::StreamConfig = supported.config();

        // Frames per second of media time; the device plays them at its
        // own rate, so `rate` scales speed.
        let media_rate = (config.sample_rate.0 as f64 / self.rate).round().max(1.0) as u32;
        let buffer = Arc::new(PlaybackBuffer::new(pcm.adapt(config.channels, media_rate)));

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => build::<f32>(&device, &config, &buffer),
            cpal::SampleFormat::I16 => build::<i16>(&device, &config, &buffer),
            cpal::SampleFormat::U16 => build::<u16>(&device, &config, &buffer),
            other => Err(format!("unsupported sample format {other:?}")),
        }?;
        stream.play().map_err(|e| e.to_string())?;

        info!(
            "Output {}: {} ch at {} Hz",
            device.name().unwrap_or_default(),
            config.channels,
            config.sample_rate.0
        );
        Ok((stream, buffer))
    }
}

fn build<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    buffer: &Arc<PlaybackBuffer>,
) -> Result<cpal::Stream, String>
where
    T: SizedSample + FromSample<f32>,
{
    let data = Arc::clone(buffer);
    let errors = Arc::clone(buffer);
    device
        .build_output_stream(
            config,
            move |out: &mut [T], _: &cpal::OutputCallbackInfo| {
                let chunk = data.take(out.len());
                let padded = chunk.iter().copied().chain(std::iter::repeat(0.0));
                for (slot, sample) in out.iter_mut().zip(padded) {
                    *slot = T::from_sample(sample);
                }
            },
            move |err| {
                error!("output stream error: {}", err);
                errors.fail(err.to_string());
            },
            None,
        )
        .map_err(|e| e.to_string())
}

impl MediaPlayer for DevicePlayer {
    fn play(&mut self, clip: Clip, source: &ResourceRef) -> Result<(), TrialError> {
        self.stop();
        let path = self.assets_dir.join(source.as_str());
        let pcm = PcmClip::load(&path).map_err(|e| TrialError::media_load(source.as_str(), e))?;

        match self.open(&pcm) {
            Ok((stream, buffer)) => {
                info!(
                    "Playing {:?} clip {} ({:.3}s)",
                    clip,
                    source,
                    pcm.duration_seconds()
                );
                self.current = Some(Active {
                    clip,
                    buffer,
                    _stream: Some(stream),
                    ended: false,
                });
            }
            Err(reason) => {
                warn!("Cannot open audio output for {}: {}", source, reason);
                self.pending_failure = Some((clip, reason));
            }
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.pending_failure = None;
        if let Some(active) = self.current.take() {
            debug!("Stopped {:?} clip", active.clip);
        }
    }
}
