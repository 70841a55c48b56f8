//! Fallback step that always fails authentication.

use tracing::info;

use crate::error::Error;
use crate::step::{AuthStep, StepStatus, TurnContext};

/// Terminates further authentication where it is undesired, e.g. after a
/// single-sign-on step that must not fall back to a password prompt.
pub struct DenyStep;

impl AuthStep for DenyStep {
    fn prepare(&mut self, _turn: &TurnContext, _first_call: bool) {}

    fn evaluate(&mut self) -> Result<StepStatus, Error> {
        info!("Deny step rejected authentication");
        Ok(StepStatus::NotAuthenticated)
    }
}
