use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use hound::SampleFormat;

/// A decoded clip: interleaved `f32` samples in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmClip {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl PcmClip {
    pub fn load(path: &Path) -> Result<Self, hound::Error> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(hound::Error::FormatError("empty channel layout or sample rate"));
        }

        let samples = match spec.sample_format {
            SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
            SampleFormat::Int => {
                let bits = spec.bits_per_sample.clamp(1, 32);
                let scale = 1.0 / (1u64 << (bits - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(Self {
            samples,
            channels: spec.channels,
            sample_rate: spec.sample_rate,
        })
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / self.sample_rate.max(1) as f64
    }

    /// Remaps channels and linearly resamples for an output stream.
    ///
    /// Mono is copied to every output channel, a mono output gets the mean
    /// of the input channels, and surplus output channels stay silent.
    pub fn adapt(&self, channels: u16, sample_rate: u32) -> PcmClip {
        let in_ch = self.channels.max(1) as usize;
        let out_ch = channels.max(1) as usize;
        let sample_rate = sample_rate.max(1);
        let in_frames = self.frames();
        if in_frames == 0 {
            return PcmClip {
                samples: Vec::new(),
                channels,
                sample_rate,
            };
        }

        let frame = |i: usize, c: usize| -> f32 {
            let base = i.min(in_frames - 1) * in_ch;
            if in_ch == 1 {
                self.samples[base]
            } else if out_ch == 1 {
                self.samples[base..base + in_ch].iter().sum::<f32>() / in_ch as f32
            } else if c < in_ch {
                self.samples[base + c]
            } else {
                0.0
            }
        };

        let step = self.sample_rate as f64 / sample_rate as f64;
        let out_frames = ((in_frames as f64) / step).ceil() as usize;
        let mut samples = Vec::with_capacity(out_frames * out_ch);
        for i in 0..out_frames {
            let pos = i as f64 * step;
            let i0 = pos.floor() as usize;
            let t = (pos - i0 as f64) as f32;
            for c in 0..out_ch {
                let a = frame(i0, c);
                let b = frame(i0 + 1, c);
                samples.push(a + (b - a) * t);
            }
        }

        PcmClip {
            samples,
            channels: out_ch as u16,
            sample_rate,
        }
    }
}

/// Samples shared between the output callback and the main thread.
///
/// The callback is the only consumer; the main thread reads how far it got
/// and whether the stream reported an error.
#[derive(Debug)]
pub struct PlaybackBuffer {
    samples: Vec<f32>,
    channels: usize,
    frames_per_second: f64,
    cursor: AtomicUsize,
    failure: Mutex<Option<String>>,
}

impl PlaybackBuffer {
    /// `clip.sample_rate` is the number of frames per second of media time.
    pub fn new(clip: PcmClip) -> Self {
        Self {
            channels: clip.channels.max(1) as usize,
            frames_per_second: clip.sample_rate.max(1) as f64,
            samples: clip.samples,
            cursor: AtomicUsize::new(0),
            failure: Mutex::new(None),
        }
    }

    /// Hands out up to `len` samples and advances past them.
    pub fn take(&self, len: usize) -> &[f32] {
        let start = self.cursor.load(Ordering::Acquire).min(self.samples.len());
        let end = start.saturating_add(len).min(self.samples.len());
        self.cursor.store(end, Ordering::Release);
        &self.samples[start..end]
    }

    /// Media time of the samples handed to the device so far.
    pub fn position_seconds(&self) -> f64 {
        let frames = self.cursor.load(Ordering::Acquire) / self.channels;
        frames as f64 / self.frames_per_second
    }

    pub fn is_drained(&self) -> bool {
        self.cursor.load(Ordering::Acquire) >= self.samples.len()
    }

    /// Records a stream error. Only the first one is kept.
    pub fn fail(&self, reason: String) {
        if let Ok(mut slot) = self.failure.lock() {
            slot.get_or_insert(reason);
        }
    }

    pub fn failure(&self) -> Option<String> {
        self.failure.lock().ok().and_then(|slot| slot.clone())
    }
}
