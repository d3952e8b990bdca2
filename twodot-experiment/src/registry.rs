use std::collections::HashMap;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use twodot_core::{ChoiceWindow, TrialError, TrialSpec};

pub const TWO_DOT: &str = "two-dot";
pub const IMAGE_AUDIO: &str = "image-audio-button-response";
pub const IMAGE_AUDIO_WITH_FEEDBACK: &str = "image-audio-with-feedback-button-response";
pub const IMAGE_BUTTON: &str = "image-button-response";

/// Turns the JSON parameters of a timeline entry into a `TrialSpec`.
pub type TrialBuilder = fn(&Value) -> Result<TrialSpec, TrialError>;

/// Trial types known to the runner, keyed by their timeline identifier.
/// Built once at startup and handed to whoever parses timelines.
#[derive(Debug, Clone, Default)]
pub struct TrialRegistry {
    builders: HashMap<&'static str, TrialBuilder>,
}

impl TrialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(TWO_DOT, build_two_dot);
        registry.register(IMAGE_AUDIO, build_image_audio);
        registry.register(IMAGE_AUDIO_WITH_FEEDBACK, build_image_audio_with_feedback);
        registry.register(IMAGE_BUTTON, build_image_button);
        registry
    }

    /// Returns the builder previously registered under `id`, if any.
    pub fn register(&mut self, id: &'static str, builder: TrialBuilder) -> Option<TrialBuilder> {
        self.builders.insert(id, builder)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.builders.contains_key(id)
    }

    pub fn ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<_> = self.builders.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn build(&self, id: &str, params: &Value) -> Result<TrialSpec, TrialError> {
        let builder = self
            .builders
            .get(id)
            .ok_or_else(|| TrialError::UnknownTrialType(id.to_string()))?;
        builder(params)
    }
}

fn params<T: DeserializeOwned>(trial_type: &str, value: &Value) -> Result<T, TrialError> {
    T::deserialize(value).map_err(|e| TrialError::Timeline(format!("{trial_type}: {e}")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TwoDotParams {
    stimulus_url: String,
    feedback_url: String,
    image_url: String,
    image_height: u32,
    first_choice_onset_time_seconds: f64,
    first_choice_offset_time_seconds: f64,
    second_choice_onset_time_seconds: f64,
    second_choice_offset_time_seconds: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageAudioParams {
    stimulus_url: String,
    #[serde(default)]
    feedback_url: Option<String>,
    image_url: String,
    image_height: u32,
}

#[derive(Debug, Deserialize)]
struct ImageButtonParams {
    stimulus: String,
    stimulus_height: u32,
}

fn build_two_dot(value: &Value) -> Result<TrialSpec, TrialError> {
    let p: TwoDotParams = params(TWO_DOT, value)?;
    Ok(TrialSpec::two_choice(
        p.stimulus_url,
        p.feedback_url,
        p.image_url,
        p.image_height,
        ChoiceWindow::new(
            p.first_choice_onset_time_seconds,
            p.first_choice_offset_time_seconds,
        ),
        ChoiceWindow::new(
            p.second_choice_onset_time_seconds,
            p.second_choice_offset_time_seconds,
        ),
    ))
}

fn build_image_audio(value: &Value) -> Result<TrialSpec, TrialError> {
    let p: ImageAudioParams = params(IMAGE_AUDIO, value)?;
    Ok(TrialSpec::image_audio(p.stimulus_url, p.image_url, p.image_height))
}

fn build_image_audio_with_feedback(value: &Value) -> Result<TrialSpec, TrialError> {
    let p: ImageAudioParams = params(IMAGE_AUDIO_WITH_FEEDBACK, value)?;
    let feedback_url = p.feedback_url.ok_or_else(|| {
        TrialError::Timeline(format!("{IMAGE_AUDIO_WITH_FEEDBACK}: missing field `feedbackUrl`"))
    })?;
    Ok(TrialSpec::image_audio_with_feedback(
        p.stimulus_url,
        feedback_url,
        p.image_url,
        p.image_height,
    ))
}

fn build_image_button(value: &Value) -> Result<TrialSpec, TrialError> {
    let p: ImageButtonParams = params(IMAGE_BUTTON, value)?;
    Ok(TrialSpec::image_only(p.stimulus, p.stimulus_height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use twodot_core::FeedbackGate;

    #[test]
    fn standard_registry_ids() {
        assert_eq!(
            TrialRegistry::standard().ids(),
            vec![
                IMAGE_AUDIO,
                IMAGE_AUDIO_WITH_FEEDBACK,
                IMAGE_BUTTON,
                TWO_DOT
            ]
        );
    }

    #[test]
    fn builds_two_dot_from_timeline_params() {
        let spec = TrialRegistry::standard()
            .build(
                TWO_DOT,
                &json!({
                    "type": "two-dot",
                    "stimulusUrl": "resources/Day1_TwoDot_PIZZA_ROOSTER.wav",
                    "feedbackUrl": "resources/Day1_TwoDot_FreeRecall_CuedRecall_ROOSTER.wav",
                    "imageUrl": "resources/Rooster.png",
                    "imageHeight": 500,
                    "firstChoiceOnsetTimeSeconds": 2.73,
                    "firstChoiceOffsetTimeSeconds": 3.25,
                    "secondChoiceOnsetTimeSeconds": 4.47,
                    "secondChoiceOffsetTimeSeconds": 4.97
                }),
            )
            .expect("two-dot spec");
        assert_eq!(spec.feedback_gate, FeedbackGate::Continuation);
        assert_eq!(
            spec.choices,
            Some((ChoiceWindow::new(2.73, 3.25), ChoiceWindow::new(4.47, 4.97)))
        );
        assert_eq!(spec.image.as_str(), "resources/Rooster.png");
    }

    #[test]
    fn builds_image_button_ignoring_extra_fields() {
        let spec = TrialRegistry::standard()
            .build(
                IMAGE_BUTTON,
                &json!({
                    "stimulus": "resources/dog1.png",
                    "stimulus_height": 500,
                    "choices": ["Continue"],
                    "prompt": ""
                }),
            )
            .expect("image spec");
        assert_eq!(spec, TrialSpec::image_only("resources/dog1.png", 500));
    }

    #[test]
    fn feedback_variant_requires_feedback_url() {
        let err = TrialRegistry::standard()
            .build(
                IMAGE_AUDIO_WITH_FEEDBACK,
                &json!({
                    "stimulusUrl": "resources/FreeRecall_WHAT.wav",
                    "imageUrl": "resources/Baby.png",
                    "imageHeight": 500
                }),
            )
            .unwrap_err();
        assert!(matches!(err, TrialError::Timeline(_)));
    }

    #[test]
    fn unknown_type_is_reported() {
        let err = TrialRegistry::standard()
            .build("html-keyboard-response", &json!({}))
            .unwrap_err();
        assert_eq!(
            err,
            TrialError::UnknownTrialType("html-keyboard-response".into())
        );
    }

    #[test]
    fn register_replaces_existing_builder() {
        let mut registry = TrialRegistry::standard();
        assert!(registry.register(IMAGE_BUTTON, build_image_button).is_some());
        assert!(registry.register("custom", build_image_button).is_none());
        assert!(registry.contains("custom"));
    }
}
