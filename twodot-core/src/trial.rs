use serde::{Deserialize, Serialize};

/// Trial state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrialPhase {
    #[default]
    Idle,
    PlayingStimulus,
    AwaitingFeedbackChoice,
    AwaitingContinue,
    PlayingFeedback,
    /// Presentation is over and the final continuation control is visible.
    Complete,
    /// The host has been signalled.
    Finished,
    Cancelled,
}

impl TrialPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }

    /// Clip whose events are relevant in this phase.
    pub fn playing_clip(&self) -> Option<Clip> {
        match self {
            Self::PlayingStimulus => Some(Clip::Stimulus),
            Self::PlayingFeedback => Some(Clip::Feedback),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Marker {
    First,
    Second,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkerAction {
    Activate(Marker),
    Deactivate(Marker),
}

/// A marker action due once the stimulus reaches `timecode_seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTransition {
    pub timecode_seconds: f64,
    pub action: MarkerAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Clip {
    Stimulus,
    Feedback,
}

/// Everything a trial reacts to: media callbacks and participant input.
#[derive(Debug, Clone, PartialEq)]
pub enum TrialEvent {
    Progress { clip: Clip, position_seconds: f64 },
    Ended(Clip),
    LoadFailed { clip: Clip, reason: String },
    ContinueActivated,
    FeedbackActivated,
}

/// Recorded result per trial, handed to the host with the completion signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub trial_index: usize,
    pub trial_type: String,
    pub degraded: bool,
    pub load_failures: Vec<String>,
    pub elapsed_ns: u64,
}
