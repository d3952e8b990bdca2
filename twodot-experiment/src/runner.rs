use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};

use tracing::{info, warn};
use twodot_core::{MediaPlayer, PresentationView, TrialError, TrialEvent, TrialOutcome, TrialSpec};

use crate::config::InvalidTrialPolicy;
use crate::controller::TrialController;
use crate::timeline::Timeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerStatus {
    Running,
    Finished,
    Aborted,
}

/// Builds the view and player for the trial about to start.
pub type TrialFactory<V, M> = Box<dyn FnMut(&TrialSpec) -> Result<(V, M), TrialError>>;

/// Walks a timeline one trial at a time.
///
/// Completion signals come back over a channel and are collected after each
/// event, so the finished trial is dropped before the next one is built.
pub struct TimelineRunner<V, M> {
    timeline: Timeline,
    policy: InvalidTrialPolicy,
    factory: TrialFactory<V, M>,
    cursor: usize,
    current: Option<TrialController<V, M>>,
    completions_tx: Sender<TrialOutcome>,
    completions_rx: Receiver<TrialOutcome>,
    outcomes: Vec<TrialOutcome>,
    skipped: Vec<(usize, TrialError)>,
    status: RunnerStatus,
}

impl<V, M> TimelineRunner<V, M>
where
    V: PresentationView + 'static,
    M: MediaPlayer + 'static,
{
    pub fn new(
        timeline: Timeline,
        policy: InvalidTrialPolicy,
        factory: impl FnMut(&TrialSpec) -> Result<(V, M), TrialError> + 'static,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::channel();
        Self {
            timeline,
            policy,
            factory: Box::new(factory),
            cursor: 0,
            current: None,
            completions_tx,
            completions_rx,
            outcomes: Vec::new(),
            skipped: Vec::new(),
            status: RunnerStatus::Running,
        }
    }

    /// Starts the first trial.
    pub fn start(&mut self) -> Result<RunnerStatus, TrialError> {
        info!("Starting timeline of {} trials", self.timeline.len());
        self.advance()?;
        Ok(self.status)
    }

    /// Forwards `event` to the running trial and moves on if it completed.
    pub fn handle_event(&mut self, event: TrialEvent) -> Result<RunnerStatus, TrialError> {
        if let Some(trial) = self.current.as_mut() {
            trial.handle_event(event);
        }
        self.collect()
    }

    /// Cancels the running trial and stops the run.
    pub fn abort(&mut self) {
        if let Some(mut trial) = self.current.take() {
            trial.cancel();
        }
        if self.status == RunnerStatus::Running {
            info!(
                "Timeline aborted after {} of {} trials",
                self.outcomes.len(),
                self.timeline.len()
            );
            self.status = RunnerStatus::Aborted;
        }
    }

    fn collect(&mut self) -> Result<RunnerStatus, TrialError> {
        while let Ok(outcome) = self.completions_rx.try_recv() {
            self.outcomes.push(outcome);
            self.advance()?;
        }
        Ok(self.status)
    }

    fn advance(&mut self) -> Result<(), TrialError> {
        // Tear down the previous trial before building the next one.
        drop(self.current.take());

        while self.status == RunnerStatus::Running {
            let Some(entry) = self.timeline.get(self.cursor) else {
                info!("Timeline finished: {} trials run", self.outcomes.len());
                self.status = RunnerStatus::Finished;
                break;
            };
            let index = self.cursor;
            self.cursor += 1;

            let tx = self.completions_tx.clone();
            let built = (self.factory)(&entry.spec).and_then(|(view, player)| {
                TrialController::new(
                    index,
                    entry.trial_type.clone(),
                    entry.spec.clone(),
                    view,
                    player,
                    move |outcome| {
                        let _ = tx.send(outcome);
                    },
                )
            });

            match built {
                Ok(mut trial) => {
                    trial.start();
                    self.current = Some(trial);
                    break;
                }
                Err(e) => match self.policy {
                    InvalidTrialPolicy::Skip => {
                        warn!("Skipping trial {}: {}", index, e);
                        self.skipped.push((index, e));
                    }
                    InvalidTrialPolicy::Abort => {
                        warn!("Aborting timeline at trial {}: {}", index, e);
                        self.status = RunnerStatus::Aborted;
                        return Err(e);
                    }
                },
            }
        }
        Ok(())
    }

    pub fn write_results(&self, path: &Path) -> Result<(), TrialError> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, &self.outcomes)
            .map_err(|e| TrialError::Io(e.to_string()))?;
        info!("Results saved to {}", path.display());
        Ok(())
    }

    pub fn status(&self) -> RunnerStatus {
        self.status
    }

    pub fn current(&self) -> Option<&TrialController<V, M>> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut TrialController<V, M>> {
        self.current.as_mut()
    }

    pub fn outcomes(&self) -> &[TrialOutcome] {
        &self.outcomes
    }

    pub fn skipped(&self) -> &[(usize, TrialError)] {
        &self.skipped
    }

    /// (1-based number of the running trial, timeline length)
    pub fn progress(&self) -> (usize, usize) {
        (self.cursor, self.timeline.len())
    }
}
