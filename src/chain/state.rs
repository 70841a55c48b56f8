//! Mutable execution position of one login attempt.

use crate::step::AuthStep;

/// Resumable state of the chain state machine. One instance per orchestrator,
/// one orchestrator per login attempt; everything the next round trip needs
/// to continue lives here.
pub(crate) struct ExecutionState {
    /// Index into the validated step list.
    pub(crate) position: usize,
    /// Whether the step at `position` must be (re)created before use.
    pub(crate) pending_new_instance: bool,
    /// Live step instance at `position`. Invariant: always corresponds to
    /// `steps[position]`; dropped whenever the position moves.
    pub(crate) current_step: Option<Box<dyn AuthStep>>,
    /// Whether the first invocation has occurred.
    pub(crate) started: bool,
}

impl ExecutionState {
    pub(crate) fn new() -> Self {
        Self {
            position: 0,
            pending_new_instance: false,
            current_step: None,
            started: false,
        }
    }

    /// Move to the next declaration, releasing the live step instance.
    pub(crate) fn advance(&mut self) {
        self.position += 1;
        self.pending_new_instance = true;
        self.current_step = None;
    }
}
