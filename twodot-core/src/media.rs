use crate::{Clip, ResourceRef, TrialError};

/// Playback primitive driven by the trial controller.
///
/// `play` may fail synchronously (the resource cannot be resolved) or the
/// player may later report `TrialEvent::LoadFailed` for the same clip.
/// Progress and end-of-playback are delivered back to the controller as
/// `TrialEvent`s tagged with the clip passed here.
pub trait MediaPlayer {
    fn play(&mut self, clip: Clip, source: &ResourceRef) -> Result<(), TrialError>;

    /// Stops whatever is playing. No events may be reported afterwards.
    fn stop(&mut self);
}
