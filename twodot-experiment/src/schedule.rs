use twodot_core::{ChoiceWindow, Marker, MarkerAction, ScheduledTransition};

/// Marker transitions of one stimulus clip, consumed strictly in order.
///
/// `cursor` only ever moves forward: a transition is handed out at most
/// once no matter how progress samples arrive (late, duplicated, coarse or
/// seeking backwards).
#[derive(Debug, Clone, Default)]
pub struct TransitionSchedule {
    transitions: Vec<ScheduledTransition>,
    cursor: usize,
}

impl TransitionSchedule {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Windows must already be validated (ordered, non-overlapping), which
    /// keeps the four transitions in ascending timecode order. On a tie
    /// between the first offset and the second onset the deactivation
    /// comes first.
    pub fn from_windows(first: ChoiceWindow, second: ChoiceWindow) -> Self {
        let at = |timecode_seconds, action| ScheduledTransition {
            timecode_seconds,
            action,
        };
        Self {
            transitions: vec![
                at(first.onset_seconds, MarkerAction::Activate(Marker::First)),
                at(first.offset_seconds, MarkerAction::Deactivate(Marker::First)),
                at(second.onset_seconds, MarkerAction::Activate(Marker::Second)),
                at(second.offset_seconds, MarkerAction::Deactivate(Marker::Second)),
            ],
            cursor: 0,
        }
    }

    pub fn transitions(&self) -> &[ScheduledTransition] {
        &self.transitions
    }

    pub fn dispatched(&self) -> usize {
        self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.transitions.len()
    }

    /// Every not-yet-dispatched transition whose timecode has been reached,
    /// in order. NaN positions reach nothing.
    pub fn due(&mut self, position_seconds: f64) -> Vec<MarkerAction> {
        let mut actions = Vec::new();
        while let Some(next) = self.transitions.get(self.cursor) {
            if position_seconds.is_nan() || next.timecode_seconds > position_seconds {
                break;
            }
            actions.push(next.action);
            self.cursor += 1;
        }
        actions
    }

    /// Forced flush at the end of the stimulus. Activations never reached
    /// are skipped; the marker left active, if any, is deactivated.
    pub fn flush(&mut self, active: Option<Marker>) -> Vec<MarkerAction> {
        let pending = &self.transitions[self.cursor.min(self.transitions.len())..];
        let actions = active
            .map(MarkerAction::Deactivate)
            .filter(|close| pending.iter().any(|t| t.action == *close))
            .into_iter()
            .collect();
        self.cursor = self.transitions.len();
        actions
    }

    /// Drops every pending transition without dispatching it.
    pub fn skip_all(&mut self) -> usize {
        let skipped = self.transitions.len().saturating_sub(self.cursor);
        self.cursor = self.transitions.len();
        skipped
    }
}
