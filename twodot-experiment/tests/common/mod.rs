#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use twodot_core::{
    ChoiceWindow, Clip, MediaPlayer, PresentationView, ResourceRef, TrialError, TrialOutcome,
    TrialSpec,
};
use twodot_experiment::TrialController;

/// Everything observable from outside a trial, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FirstActive,
    FirstInactive,
    SecondActive,
    SecondInactive,
    RevealContinuation,
    ConcealContinuation,
    RevealFeedback,
    ConcealFeedback,
    Play(Clip),
    Stop,
    Complete(TrialOutcome),
}

pub type Log = Rc<RefCell<Vec<Call>>>;

pub struct RecordingView {
    log: Log,
    first: bool,
    second: bool,
    pub overlap_seen: bool,
}

impl RecordingView {
    pub fn new(log: &Log) -> Self {
        Self {
            log: Rc::clone(log),
            first: false,
            second: false,
            overlap_seen: false,
        }
    }

    fn push(&mut self, call: Call) {
        self.overlap_seen |= self.first && self.second;
        self.log.borrow_mut().push(call);
    }
}

impl PresentationView for RecordingView {
    fn mark_first_active(&mut self) {
        self.first = true;
        self.push(Call::FirstActive);
    }
    fn mark_first_inactive(&mut self) {
        self.first = false;
        self.push(Call::FirstInactive);
    }
    fn mark_second_active(&mut self) {
        self.second = true;
        self.push(Call::SecondActive);
    }
    fn mark_second_inactive(&mut self) {
        self.second = false;
        self.push(Call::SecondInactive);
    }
    fn reveal_continuation(&mut self) {
        self.push(Call::RevealContinuation);
    }
    fn conceal_continuation(&mut self) {
        self.push(Call::ConcealContinuation);
    }
    fn reveal_feedback_control(&mut self) {
        self.push(Call::RevealFeedback);
    }
    fn conceal_feedback_control(&mut self) {
        self.push(Call::ConcealFeedback);
    }
}

/// Player whose media events are fed by the test itself.
pub struct ScriptedPlayer {
    log: Log,
    failing: HashSet<Clip>,
}

impl ScriptedPlayer {
    pub fn new(log: &Log) -> Self {
        Self {
            log: Rc::clone(log),
            failing: HashSet::new(),
        }
    }

    pub fn failing(mut self, clip: Clip) -> Self {
        self.failing.insert(clip);
        self
    }
}

impl MediaPlayer for ScriptedPlayer {
    fn play(&mut self, clip: Clip, source: &ResourceRef) -> Result<(), TrialError> {
        if self.failing.contains(&clip) {
            return Err(TrialError::media_load(source.as_str(), "decode error"));
        }
        self.log.borrow_mut().push(Call::Play(clip));
        Ok(())
    }

    fn stop(&mut self) {
        self.log.borrow_mut().push(Call::Stop);
    }
}

pub fn baby_cheetah() -> TrialSpec {
    TrialSpec::two_choice(
        "resources/Day1_TwoDot_BABY_CHEETAH.wav",
        "resources/Day1_TwoDot_FreeRecall_CuedRecall_BABY.wav",
        "resources/Baby.png",
        500,
        ChoiceWindow::new(2.53, 3.0),
        ChoiceWindow::new(3.96, 4.41),
    )
}

pub fn controller(
    spec: TrialSpec,
    log: &Log,
    player: ScriptedPlayer,
) -> Result<TrialController<RecordingView, ScriptedPlayer>, TrialError> {
    let completion_log = Rc::clone(log);
    TrialController::new(0, "two-dot", spec, RecordingView::new(log), player, move |outcome| {
        completion_log.borrow_mut().push(Call::Complete(outcome))
    })
}

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// Marker calls only, in order.
pub fn marker_calls(log: &Log) -> Vec<Call> {
    log.borrow()
        .iter()
        .filter(|c| {
            matches!(
                c,
                Call::FirstActive | Call::FirstInactive | Call::SecondActive | Call::SecondInactive
            )
        })
        .cloned()
        .collect()
}

pub fn completions(log: &Log) -> usize {
    log.borrow()
        .iter()
        .filter(|c| matches!(c, Call::Complete(_)))
        .count()
}
