/// Rendering surface for one trial.
///
/// Every operation is an idempotent visual mutation: it must not block and
/// has no effect outside the visual tree. A fresh view starts with both
/// markers inactive and every control hidden.
pub trait PresentationView {
    fn mark_first_active(&mut self);
    fn mark_first_inactive(&mut self);
    fn mark_second_active(&mut self);
    fn mark_second_inactive(&mut self);
    fn reveal_continuation(&mut self);

    // Control visibility for the feedback variants. Views without those
    // controls can ignore them.
    fn conceal_continuation(&mut self) {}
    fn reveal_feedback_control(&mut self) {}
    fn conceal_feedback_control(&mut self) {}
}
