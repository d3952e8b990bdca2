mod common;

use common::*;
use twodot_core::{Clip, Marker, TrialError, TrialEvent, TrialPhase, TrialSpec};

fn progress(position_seconds: f64) -> TrialEvent {
    TrialEvent::Progress {
        clip: Clip::Stimulus,
        position_seconds,
    }
}

const MARKER_SEQUENCE: [Call; 4] = [
    Call::FirstActive,
    Call::FirstInactive,
    Call::SecondActive,
    Call::SecondInactive,
];

#[test]
fn two_choice_full_trial() {
    let log = new_log();
    let mut trial = controller(baby_cheetah(), &log, ScriptedPlayer::new(&log)).expect("valid");
    assert_eq!(trial.phase(), TrialPhase::Idle);

    trial.start();
    assert_eq!(trial.phase(), TrialPhase::PlayingStimulus);
    assert_eq!(log.borrow().as_slice(), &[Call::Play(Clip::Stimulus)]);

    for pos in [0.0, 2.0, 2.53, 2.9, 3.0, 3.96, 4.41, 5.0] {
        trial.handle_event(progress(pos));
    }
    assert_eq!(marker_calls(&log), MARKER_SEQUENCE.to_vec());

    // Continuation is hidden until the stimulus ends.
    assert!(!trial.handle_event(TrialEvent::ContinueActivated));

    assert!(trial.handle_event(TrialEvent::Ended(Clip::Stimulus)));
    assert_eq!(trial.phase(), TrialPhase::AwaitingContinue);
    assert_eq!(log.borrow().last(), Some(&Call::RevealContinuation));

    assert!(trial.handle_event(TrialEvent::ContinueActivated));
    assert_eq!(trial.phase(), TrialPhase::PlayingFeedback);
    {
        let log = log.borrow();
        let tail = &log[log.len() - 2..];
        assert_eq!(tail, &[Call::ConcealContinuation, Call::Play(Clip::Feedback)]);
    }

    // The control is hidden while feedback plays.
    assert!(!trial.handle_event(TrialEvent::ContinueActivated));

    assert!(trial.handle_event(TrialEvent::Ended(Clip::Feedback)));
    assert_eq!(trial.phase(), TrialPhase::Complete);
    assert_eq!(completions(&log), 0);

    assert!(trial.handle_event(TrialEvent::ContinueActivated));
    assert_eq!(trial.phase(), TrialPhase::Finished);
    assert_eq!(completions(&log), 1);

    assert!(!trial.handle_event(TrialEvent::ContinueActivated));
    assert_eq!(completions(&log), 1);
    assert!(!trial.view().overlap_seen);
}

#[test]
fn coarse_sampling_fires_all_transitions_at_once() {
    let log = new_log();
    let mut trial = controller(baby_cheetah(), &log, ScriptedPlayer::new(&log)).expect("valid");
    trial.start();

    assert!(!trial.handle_event(progress(2.0)));
    assert!(marker_calls(&log).is_empty());

    assert!(trial.handle_event(progress(5.0)));
    assert_eq!(marker_calls(&log), MARKER_SEQUENCE.to_vec());
    assert_eq!(trial.active_marker(), None);
}

#[test]
fn duplicated_and_reordered_samples_dispatch_once() {
    let log = new_log();
    let mut trial = controller(baby_cheetah(), &log, ScriptedPlayer::new(&log)).expect("valid");
    trial.start();

    for pos in [2.6, 2.6, 1.0, 2.7, 3.2, 0.0, 3.2, 4.0, 3.97, 4.5, 4.5, 2.0] {
        trial.handle_event(progress(pos));
    }
    assert_eq!(marker_calls(&log), MARKER_SEQUENCE.to_vec());
}

#[test]
fn marker_stays_lit_between_samples() {
    let log = new_log();
    let mut trial = controller(baby_cheetah(), &log, ScriptedPlayer::new(&log)).expect("valid");
    trial.start();

    trial.handle_event(progress(2.8));
    assert_eq!(trial.active_marker(), Some(Marker::First));
    trial.handle_event(progress(3.5));
    assert_eq!(trial.active_marker(), None);
    trial.handle_event(progress(4.0));
    assert_eq!(trial.active_marker(), Some(Marker::Second));
}

#[test]
fn adjacent_windows_never_overlap() {
    let mut spec = baby_cheetah();
    spec.choices = Some((
        twodot_core::ChoiceWindow::new(1.0, 2.0),
        twodot_core::ChoiceWindow::new(2.0, 3.0),
    ));
    let log = new_log();
    let mut trial = controller(spec, &log, ScriptedPlayer::new(&log)).expect("valid");
    trial.start();

    trial.handle_event(progress(2.0));
    trial.handle_event(progress(3.0));
    assert_eq!(marker_calls(&log), MARKER_SEQUENCE.to_vec());
    assert!(!trial.view().overlap_seen);
}

#[test]
fn window_past_clip_end_is_closed_when_stimulus_ends() {
    let log = new_log();
    let mut trial = controller(baby_cheetah(), &log, ScriptedPlayer::new(&log)).expect("valid");
    trial.start();

    trial.handle_event(progress(4.2));
    assert_eq!(trial.active_marker(), Some(Marker::Second));
    trial.handle_event(TrialEvent::Ended(Clip::Stimulus));

    assert_eq!(marker_calls(&log), MARKER_SEQUENCE.to_vec());
    assert_eq!(trial.active_marker(), None);
}

#[test]
fn windows_never_reached_are_skipped() {
    let log = new_log();
    let mut trial = controller(baby_cheetah(), &log, ScriptedPlayer::new(&log)).expect("valid");
    trial.start();

    trial.handle_event(progress(3.5));
    trial.handle_event(TrialEvent::Ended(Clip::Stimulus));

    assert_eq!(
        marker_calls(&log),
        vec![Call::FirstActive, Call::FirstInactive]
    );
    // Late samples after the end change nothing.
    assert!(!trial.handle_event(progress(4.0)));
}

#[test]
fn stimulus_load_failure_takes_the_degraded_path() {
    let log = new_log();
    let player = ScriptedPlayer::new(&log).failing(Clip::Stimulus);
    let mut trial = controller(baby_cheetah(), &log, player).expect("valid");
    trial.start();

    assert_eq!(trial.phase(), TrialPhase::Complete);
    assert!(matches!(trial.warnings(), [TrialError::MediaLoad { .. }]));
    assert!(log.borrow().contains(&Call::RevealContinuation));

    // Samples arriving anyway are ignored.
    assert!(!trial.handle_event(progress(5.0)));

    assert!(trial.handle_event(TrialEvent::ContinueActivated));
    assert!(marker_calls(&log).is_empty());
    assert_eq!(completions(&log), 1);

    let log = log.borrow();
    let Some(Call::Complete(outcome)) = log.last() else {
        panic!("trial did not complete: {log:?}");
    };
    assert!(outcome.degraded);
    assert_eq!(outcome.load_failures.len(), 1);
}

#[test]
fn late_load_failure_closes_the_open_marker() {
    let log = new_log();
    let mut trial = controller(baby_cheetah(), &log, ScriptedPlayer::new(&log)).expect("valid");
    trial.start();

    trial.handle_event(progress(2.7));
    assert!(trial.handle_event(TrialEvent::LoadFailed {
        clip: Clip::Stimulus,
        reason: "stream stalled".into(),
    }));

    assert_eq!(
        marker_calls(&log),
        vec![Call::FirstActive, Call::FirstInactive]
    );
    assert_eq!(trial.phase(), TrialPhase::Complete);
    assert!(trial.handle_event(TrialEvent::ContinueActivated));
    assert_eq!(completions(&log), 1);
}

#[test]
fn feedback_load_failure_still_completes() {
    let log = new_log();
    let player = ScriptedPlayer::new(&log).failing(Clip::Feedback);
    let mut trial = controller(baby_cheetah(), &log, player).expect("valid");
    trial.start();
    trial.handle_event(progress(5.0));
    trial.handle_event(TrialEvent::Ended(Clip::Stimulus));
    trial.handle_event(TrialEvent::ContinueActivated);

    assert_eq!(trial.phase(), TrialPhase::Complete);
    assert_eq!(
        log.borrow()
            .iter()
            .filter(|c| **c == Call::RevealContinuation)
            .count(),
        2
    );
    assert!(trial.handle_event(TrialEvent::ContinueActivated));
    assert_eq!(completions(&log), 1);
}

#[test]
fn cancel_mid_playback_is_silent() {
    let log = new_log();
    let mut trial = controller(baby_cheetah(), &log, ScriptedPlayer::new(&log)).expect("valid");
    trial.start();
    trial.handle_event(progress(2.7));

    trial.cancel();
    assert_eq!(trial.phase(), TrialPhase::Cancelled);
    let after_cancel = log.borrow().len();
    assert_eq!(log.borrow().last(), Some(&Call::Stop));

    for event in [
        progress(5.0),
        TrialEvent::Ended(Clip::Stimulus),
        TrialEvent::ContinueActivated,
        TrialEvent::ContinueActivated,
    ] {
        assert!(!trial.handle_event(event));
    }
    assert_eq!(log.borrow().len(), after_cancel);
    assert_eq!(completions(&log), 0);
}

#[test]
fn invalid_spec_is_rejected_at_construction() {
    let mut spec = baby_cheetah();
    spec.choices = Some((
        twodot_core::ChoiceWindow::new(3.0, 4.0),
        twodot_core::ChoiceWindow::new(3.5, 5.0),
    ));
    let log = new_log();
    let err = controller(spec, &log, ScriptedPlayer::new(&log)).unwrap_err();
    assert!(matches!(err, TrialError::InvalidTrialSpec(_)));
    assert!(log.borrow().is_empty());
}

#[test]
fn image_audio_trial_completes_on_first_continue() {
    let log = new_log();
    let spec = TrialSpec::image_audio("resources/Repetition_KINIT.wav", "resources/Kinit.png", 500);
    let mut trial = controller(spec, &log, ScriptedPlayer::new(&log)).expect("valid");
    trial.start();

    assert!(!trial.handle_event(progress(1.0)));
    trial.handle_event(TrialEvent::Ended(Clip::Stimulus));
    assert_eq!(trial.phase(), TrialPhase::AwaitingContinue);

    assert!(trial.handle_event(TrialEvent::ContinueActivated));
    assert_eq!(trial.phase(), TrialPhase::Finished);
    assert_eq!(completions(&log), 1);
    assert!(!log.borrow().contains(&Call::Play(Clip::Feedback)));
}

#[test]
fn feedback_control_gates_the_feedback_clip() {
    let log = new_log();
    let spec = TrialSpec::image_audio_with_feedback(
        "resources/FreeRecall_WHAT.wav",
        "resources/TwoDot_FreeRecall_CuedRecall_NEDIG.wav",
        "resources/Nedig.png",
        500,
    );
    let mut trial = controller(spec, &log, ScriptedPlayer::new(&log)).expect("valid");
    trial.start();
    trial.handle_event(TrialEvent::Ended(Clip::Stimulus));
    assert_eq!(trial.phase(), TrialPhase::AwaitingFeedbackChoice);
    assert_eq!(log.borrow().last(), Some(&Call::RevealFeedback));

    assert!(!trial.handle_event(TrialEvent::ContinueActivated));

    assert!(trial.handle_event(TrialEvent::FeedbackActivated));
    assert!(!trial.handle_event(TrialEvent::FeedbackActivated));
    assert_eq!(trial.phase(), TrialPhase::PlayingFeedback);

    trial.handle_event(TrialEvent::Ended(Clip::Feedback));
    assert_eq!(trial.phase(), TrialPhase::Complete);
    assert!(trial.handle_event(TrialEvent::ContinueActivated));
    assert_eq!(completions(&log), 1);

    let log = log.borrow();
    let position = |call: &Call| log.iter().position(|c| c == call);
    assert!(position(&Call::ConcealFeedback) < position(&Call::Play(Clip::Feedback)));
    assert!(position(&Call::RevealContinuation) < log.iter().position(|c| matches!(c, Call::Complete(_))));
}

#[test]
fn image_only_trial_needs_no_audio() {
    let log = new_log();
    let mut trial = controller(
        TrialSpec::image_only("resources/dog1.png", 500),
        &log,
        ScriptedPlayer::new(&log),
    )
    .expect("valid");
    trial.start();

    assert_eq!(trial.phase(), TrialPhase::Complete);
    assert_eq!(log.borrow().as_slice(), &[Call::RevealContinuation]);
    assert!(trial.handle_event(TrialEvent::ContinueActivated));
    assert_eq!(completions(&log), 1);
}

#[test]
fn stale_clip_events_are_ignored() {
    let log = new_log();
    let mut trial = controller(baby_cheetah(), &log, ScriptedPlayer::new(&log)).expect("valid");
    trial.start();

    assert!(!trial.handle_event(TrialEvent::Ended(Clip::Feedback)));
    assert!(!trial.handle_event(TrialEvent::Progress {
        clip: Clip::Feedback,
        position_seconds: 5.0,
    }));
    assert!(!trial.handle_event(TrialEvent::LoadFailed {
        clip: Clip::Feedback,
        reason: "late".into(),
    }));
    assert_eq!(trial.phase(), TrialPhase::PlayingStimulus);

    trial.handle_event(TrialEvent::Ended(Clip::Stimulus));
    assert!(!trial.handle_event(TrialEvent::Ended(Clip::Stimulus)));
}

#[test]
fn start_twice_plays_once() {
    let log = new_log();
    let mut trial = controller(baby_cheetah(), &log, ScriptedPlayer::new(&log)).expect("valid");
    trial.start();
    trial.start();
    assert_eq!(
        log.borrow()
            .iter()
            .filter(|c| **c == Call::Play(Clip::Stimulus))
            .count(),
        1
    );
}
