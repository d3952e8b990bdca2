use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TrialError;

/// Identifier of a media resource, usually a path relative to the assets dir.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceRef(pub String);

impl ResourceRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ResourceRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Interval of the stimulus clip during which one choice is spoken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChoiceWindow {
    pub onset_seconds: f64,
    pub offset_seconds: f64,
}

impl ChoiceWindow {
    pub fn new(onset_seconds: f64, offset_seconds: f64) -> Self {
        Self {
            onset_seconds,
            offset_seconds,
        }
    }
}

/// How the feedback clip is reached once the stimulus has played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FeedbackGate {
    /// No feedback clip; continuing ends the trial.
    #[default]
    None,
    /// Activating the continuation control plays the feedback clip.
    Continuation,
    /// A dedicated feedback control plays the feedback clip.
    FeedbackControl,
}

/// Parameters of one trial, fixed for the trial's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSpec {
    pub stimulus_audio: Option<ResourceRef>,
    pub feedback_audio: Option<ResourceRef>,
    pub image: ResourceRef,
    pub image_height_px: u32,
    pub choices: Option<(ChoiceWindow, ChoiceWindow)>,
    pub feedback_gate: FeedbackGate,
}

impl TrialSpec {
    /// The two-choice trial: markers follow the choices spoken in the
    /// stimulus, continuing plays the feedback clip.
    pub fn two_choice(
        stimulus_audio: impl Into<ResourceRef>,
        feedback_audio: impl Into<ResourceRef>,
        image: impl Into<ResourceRef>,
        image_height_px: u32,
        first: ChoiceWindow,
        second: ChoiceWindow,
    ) -> Self {
        Self {
            stimulus_audio: Some(stimulus_audio.into()),
            feedback_audio: Some(feedback_audio.into()),
            image: image.into(),
            image_height_px,
            choices: Some((first, second)),
            feedback_gate: FeedbackGate::Continuation,
        }
    }

    pub fn image_audio(
        stimulus_audio: impl Into<ResourceRef>,
        image: impl Into<ResourceRef>,
        image_height_px: u32,
    ) -> Self {
        Self {
            stimulus_audio: Some(stimulus_audio.into()),
            feedback_audio: None,
            image: image.into(),
            image_height_px,
            choices: None,
            feedback_gate: FeedbackGate::None,
        }
    }

    pub fn image_audio_with_feedback(
        stimulus_audio: impl Into<ResourceRef>,
        feedback_audio: impl Into<ResourceRef>,
        image: impl Into<ResourceRef>,
        image_height_px: u32,
    ) -> Self {
        Self {
            stimulus_audio: Some(stimulus_audio.into()),
            feedback_audio: Some(feedback_audio.into()),
            image: image.into(),
            image_height_px,
            choices: None,
            feedback_gate: FeedbackGate::FeedbackControl,
        }
    }

    /// Image with a continuation control and no audio.
    pub fn image_only(image: impl Into<ResourceRef>, image_height_px: u32) -> Self {
        Self {
            stimulus_audio: None,
            feedback_audio: None,
            image: image.into(),
            image_height_px,
            choices: None,
            feedback_gate: FeedbackGate::None,
        }
    }

    pub fn has_markers(&self) -> bool {
        self.choices.is_some()
    }

    /// Checks the timing windows and the clip/gate combination.
    pub fn validate(&self) -> Result<(), TrialError> {
        if self.image_height_px == 0 {
            return Err(TrialError::invalid("image height must be positive"));
        }

        if self.feedback_gate != FeedbackGate::None && self.feedback_audio.is_none() {
            return Err(TrialError::invalid(format!(
                "feedback gate {:?} requires a feedback clip",
                self.feedback_gate
            )));
        }

        if let Some((first, second)) = &self.choices {
            if self.stimulus_audio.is_none() {
                return Err(TrialError::invalid("choice windows require a stimulus clip"));
            }
            validate_window("first", first)?;
            validate_window("second", second)?;
            if first.offset_seconds > second.onset_seconds {
                return Err(TrialError::invalid(format!(
                    "first window ends at {}s after second window starts at {}s",
                    first.offset_seconds, second.onset_seconds
                )));
            }
        }

        Ok(())
    }
}

fn validate_window(name: &str, window: &ChoiceWindow) -> Result<(), TrialError> {
    let ChoiceWindow {
        onset_seconds,
        offset_seconds,
    } = *window;
    if !onset_seconds.is_finite() || !offset_seconds.is_finite() {
        return Err(TrialError::invalid(format!(
            "{name} window has a non-finite timecode"
        )));
    }
    if onset_seconds < 0.0 {
        return Err(TrialError::invalid(format!(
            "{name} window starts before the clip ({onset_seconds}s)"
        )));
    }
    if onset_seconds >= offset_seconds {
        return Err(TrialError::invalid(format!(
            "{name} window onset {onset_seconds}s is not before offset {offset_seconds}s"
        )));
    }
    Ok(())
}
