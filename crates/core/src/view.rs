//! The presentation side of a chat session.

use crate::transcript::Transcript;

/// What the controller needs from the user interface.
///
/// The controller owns the view and calls it from its own task, in the
/// order the exchange progresses. A view never mutates the transcript; it
/// only renders the snapshot it is handed.
pub trait View: Send + 'static {
    /// Empties the input field.
    fn clear_input(&mut self);

    /// Redraws the message list from `transcript`.
    fn refresh(&mut self, transcript: &Transcript);

    /// Moves keyboard focus back to the input field.
    fn focus_input(&mut self);
}

/// A headless view that ignores every call.
impl View for () {
    #[inline]
    fn clear_input(&mut self) {}

    #[inline]
    fn refresh(&mut self, _transcript: &Transcript) {}

    #[inline]
    fn focus_input(&mut self) {}
}
