//! Error taxonomy shared by the chain orchestrator and step implementations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A step could not be resolved or constructed. During chain validation
    /// the declaration is dropped and logged; at run time this terminates the
    /// chain with a not-authenticated outcome.
    #[error("failed to construct step `{name}`: {reason}")]
    StepConstruction { name: String, reason: String },
    /// A step failed while evaluating. Caught at the orchestrator boundary
    /// and converted to a not-authenticated outcome, never surfaced raw.
    #[error("step evaluation failed: {0}")]
    Step(String),
    /// A step implementation is missing a required configuration property.
    #[error("missing required property `{0}`")]
    MissingProperty(&'static str),
}

impl Error {
    /// Shorthand for a construction failure that carries the step name.
    pub fn construction(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StepConstruction {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
