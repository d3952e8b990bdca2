pub mod error;
pub mod media;
pub mod spec;
pub mod trial;
pub mod view;

pub use error::TrialError;
pub use media::MediaPlayer;
pub use spec::{ChoiceWindow, FeedbackGate, ResourceRef, TrialSpec};
pub use trial::{
    Clip, Marker, MarkerAction, ScheduledTransition, TrialEvent, TrialOutcome, TrialPhase,
};
pub use view::PresentationView;
