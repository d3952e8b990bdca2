use std::fmt;
use std::time::Instant;

use tracing::{debug, error, info, warn};
use twodot_core::{
    Clip, FeedbackGate, Marker, MarkerAction, MediaPlayer, PresentationView, TrialError,
    TrialEvent, TrialOutcome, TrialPhase, TrialSpec,
};

use crate::schedule::TransitionSchedule;

/// Host callback invoked once when the participant leaves the trial.
pub type CompletionSignal = Box<dyn FnOnce(TrialOutcome)>;

/// Mutable per-trial state, discarded with the controller.
#[derive(Debug, Default)]
struct TrialState {
    phase: TrialPhase,
    active_marker: Option<Marker>,
    schedule: TransitionSchedule,
    continuation_visible: bool,
    load_failures: Vec<TrialError>,
}

/// Drives one trial: plays the stimulus, keeps the markers in step with
/// it, gates the feedback clip and signals the host when the participant
/// continues.
///
/// All input arrives through `handle_event` on a single thread; nothing
/// here blocks or spawns.
pub struct TrialController<V, M> {
    index: usize,
    trial_type: String,
    spec: TrialSpec,
    view: V,
    player: M,
    state: TrialState,
    on_complete: Option<CompletionSignal>,
    created_at: Instant,
}

impl<V, M> fmt::Debug for TrialController<V, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrialController")
            .field("index", &self.index)
            .field("trial_type", &self.trial_type)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<V, M> TrialController<V, M>
where
    V: PresentationView,
    M: MediaPlayer,
{
    /// Validates `spec` and prepares the marker schedule. Nothing is shown
    /// or played until `start`.
    pub fn new(
        index: usize,
        trial_type: impl Into<String>,
        spec: TrialSpec,
        view: V,
        player: M,
        on_complete: impl FnOnce(TrialOutcome) + 'static,
    ) -> Result<Self, TrialError> {
        spec.validate()?;

        let schedule = match spec.choices {
            Some((first, second)) => TransitionSchedule::from_windows(first, second),
            None => TransitionSchedule::empty(),
        };

        Ok(Self {
            index,
            trial_type: trial_type.into(),
            spec,
            view,
            player,
            state: TrialState {
                schedule,
                ..TrialState::default()
            },
            on_complete: Some(Box::new(on_complete)),
            created_at: Instant::now(),
        })
    }

    pub fn start(&mut self) {
        if self.state.phase != TrialPhase::Idle {
            warn!(
                "Trial {} already started ({:?})",
                self.index, self.state.phase
            );
            return;
        }
        info!(
            "Trial {} ({}) started: {} scheduled transitions",
            self.index,
            self.trial_type,
            self.state.schedule.transitions().len()
        );

        let Some(source) = &self.spec.stimulus_audio else {
            self.reveal_final_continuation();
            self.state.phase = TrialPhase::Complete;
            return;
        };

        self.state.phase = TrialPhase::PlayingStimulus;
        if let Err(e) = self.player.play(Clip::Stimulus, source) {
            self.degrade(e);
        }
    }

    /// Feeds one media or input event through the state machine. Returns
    /// true when the event changed something.
    pub fn handle_event(&mut self, event: TrialEvent) -> bool {
        if self.state.phase.is_terminal() {
            return false;
        }

        match event {
            TrialEvent::Progress {
                clip,
                position_seconds,
            } => self.on_progress(clip, position_seconds),
            TrialEvent::Ended(clip) => self.on_ended(clip),
            TrialEvent::LoadFailed { clip, reason } => {
                if self.state.phase.playing_clip() != Some(clip) {
                    return false;
                }
                let source = match clip {
                    Clip::Stimulus => self.spec.stimulus_audio.as_ref(),
                    Clip::Feedback => self.spec.feedback_audio.as_ref(),
                };
                let source = source.map(|s| s.to_string()).unwrap_or_default();
                self.degrade(TrialError::media_load(source, reason));
                true
            }
            TrialEvent::ContinueActivated => self.on_continue(),
            TrialEvent::FeedbackActivated => self.on_feedback(),
        }
    }

    /// Ends the trial early: stops audio, drops pending transitions and the
    /// completion signal. The view is left untouched.
    pub fn cancel(&mut self) {
        if self.state.phase.is_terminal() {
            return;
        }
        self.player.stop();
        let skipped = self.state.schedule.skip_all();
        self.on_complete = None;
        info!(
            "Trial {} cancelled in {:?} ({} transitions dropped)",
            self.index, self.state.phase, skipped
        );
        self.state.phase = TrialPhase::Cancelled;
    }

    fn on_progress(&mut self, clip: Clip, position_seconds: f64) -> bool {
        if self.state.phase != TrialPhase::PlayingStimulus || clip != Clip::Stimulus {
            return false;
        }
        let actions = self.state.schedule.due(position_seconds);
        for action in &actions {
            debug!("{:.3}s: {:?}", position_seconds, action);
            self.apply(*action);
        }
        !actions.is_empty()
    }

    fn on_ended(&mut self, clip: Clip) -> bool {
        match (self.state.phase, clip) {
            (TrialPhase::PlayingStimulus, Clip::Stimulus) => {
                self.flush_markers();
                match self.spec.feedback_gate {
                    FeedbackGate::None | FeedbackGate::Continuation => {
                        self.reveal_final_continuation();
                        self.state.phase = TrialPhase::AwaitingContinue;
                    }
                    FeedbackGate::FeedbackControl => {
                        self.view.reveal_feedback_control();
                        self.state.phase = TrialPhase::AwaitingFeedbackChoice;
                    }
                }
                true
            }
            (TrialPhase::PlayingFeedback, Clip::Feedback) => {
                self.reveal_final_continuation();
                self.state.phase = TrialPhase::Complete;
                true
            }
            _ => false,
        }
    }

    fn on_continue(&mut self) -> bool {
        if !self.state.continuation_visible {
            return false;
        }
        match (self.state.phase, self.spec.feedback_gate) {
            (TrialPhase::AwaitingContinue, FeedbackGate::Continuation) => {
                self.view.conceal_continuation();
                self.state.continuation_visible = false;
                self.play_feedback();
                true
            }
            (TrialPhase::AwaitingContinue, _) => {
                self.state.phase = TrialPhase::Complete;
                self.finish()
            }
            (TrialPhase::Complete, _) => self.finish(),
            _ => false,
        }
    }

    fn on_feedback(&mut self) -> bool {
        if self.state.phase != TrialPhase::AwaitingFeedbackChoice {
            return false;
        }
        self.view.conceal_feedback_control();
        self.play_feedback();
        true
    }

    fn play_feedback(&mut self) {
        self.state.phase = TrialPhase::PlayingFeedback;
        let Some(source) = &self.spec.feedback_audio else {
            self.reveal_final_continuation();
            self.state.phase = TrialPhase::Complete;
            return;
        };
        if let Err(e) = self.player.play(Clip::Feedback, source) {
            self.degrade(e);
        }
    }

    /// Degraded path after a clip failed to load: close any open marker,
    /// give up on the remaining transitions and let the participant go on.
    fn degrade(&mut self, err: TrialError) {
        warn!(
            "Trial {}: {} in {:?}, revealing continuation",
            self.index, err, self.state.phase
        );
        self.player.stop();
        self.flush_markers();
        self.view.conceal_feedback_control();
        self.reveal_final_continuation();
        self.state.load_failures.push(err);
        self.state.phase = TrialPhase::Complete;
    }

    fn flush_markers(&mut self) {
        for action in self.state.schedule.flush(self.state.active_marker) {
            debug!("flush: {:?}", action);
            self.apply(action);
        }
    }

    fn apply(&mut self, action: MarkerAction) {
        match action {
            MarkerAction::Activate(marker) => {
                debug_assert!(self.state.active_marker.is_none());
                match marker {
                    Marker::First => self.view.mark_first_active(),
                    Marker::Second => self.view.mark_second_active(),
                }
                self.state.active_marker = Some(marker);
            }
            MarkerAction::Deactivate(marker) => {
                match marker {
                    Marker::First => self.view.mark_first_inactive(),
                    Marker::Second => self.view.mark_second_inactive(),
                }
                if self.state.active_marker == Some(marker) {
                    self.state.active_marker = None;
                }
            }
        }
    }

    fn reveal_final_continuation(&mut self) {
        if !self.state.continuation_visible {
            self.view.reveal_continuation();
            self.state.continuation_visible = true;
        }
    }

    fn finish(&mut self) -> bool {
        let Some(signal) = self.on_complete.take() else {
            error!("Trial {}: {}", self.index, TrialError::DoubleCompletion);
            return false;
        };
        self.player.stop();
        self.state.phase = TrialPhase::Finished;

        let outcome = TrialOutcome {
            trial_index: self.index,
            trial_type: self.trial_type.clone(),
            degraded: !self.state.load_failures.is_empty(),
            load_failures: self
                .state
                .load_failures
                .iter()
                .map(|e| e.to_string())
                .collect(),
            elapsed_ns: self.created_at.elapsed().as_nanos() as u64,
        };
        info!(
            "Trial {} finished{}",
            self.index,
            if outcome.degraded { " (degraded)" } else { "" }
        );
        signal(outcome);
        true
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn spec(&self) -> &TrialSpec {
        &self.spec
    }

    pub fn phase(&self) -> TrialPhase {
        self.state.phase
    }

    pub fn active_marker(&self) -> Option<Marker> {
        self.state.active_marker
    }

    pub fn is_finished(&self) -> bool {
        self.state.phase.is_terminal()
    }

    /// Media failures recovered through the degraded path.
    pub fn warnings(&self) -> &[TrialError] {
        &self.state.load_failures
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn player_mut(&mut self) -> &mut M {
        &mut self.player
    }
}
