//! The step contract: what the orchestrator consumes and every pluggable
//! authentication check implements.
//!
//! A step lives across round trips: the orchestrator calls
//! [`AuthStep::prepare`] with the current turn's data, then
//! [`AuthStep::evaluate`], and keeps the instance alive while the step is
//! waiting for user interaction. The accessors are only meaningful after
//! `evaluate` has returned the corresponding status.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chain::config::PropertyBag;
use crate::error::Error;
use crate::principal::{Credentials, Identity, PasswordExpiry};

/// Result code of one step evaluation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepStatus {
    /// The step established an authenticated identity.
    Authenticated,
    /// The step rejected the authentication attempt.
    NotAuthenticated,
    /// The step needs user interaction; the chain pauses and the page to
    /// render is available from [`AuthStep::page_to_show`].
    AwaitingInteraction,
    /// Success with a caveat (e.g. password nearing expiry); details are
    /// available from [`AuthStep::password_expiry`].
    ConditionallyAuthenticated,
    /// Implementation-specific status, passed through the chain untouched.
    Other(i32),
}

/// Page the host should render while a step waits for user interaction.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PageDescriptor {
    name: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    attributes: PropertyBag,
}

impl PageDescriptor {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: PropertyBag::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// Per-round-trip carrier for request parameters, session attributes, and
/// the return URL. The transport layer builds one per external invocation.
#[derive(Clone, Debug, Default)]
pub struct TurnContext {
    params: PropertyBag,
    attributes: PropertyBag,
    return_url: Option<String>,
}

impl TurnContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_return_url(mut self, url: impl Into<String>) -> Self {
        self.return_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Request parameter as a string, the common case for form submissions.
    #[must_use]
    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    #[must_use]
    pub fn return_url(&self) -> Option<&str> {
        self.return_url.as_deref()
    }
}

/// One pluggable authentication check.
///
/// Instances are built by a registered factory from a merged property bag
/// and the shared user stores. `Send` because the owning login attempt may
/// resume on a different worker thread between round trips.
pub trait AuthStep: Send {
    /// Bind the current turn's request/session data into the step. Called
    /// before every [`AuthStep::evaluate`]; `first_call` is true exactly on
    /// the first interaction with this step instance.
    fn prepare(&mut self, turn: &TurnContext, first_call: bool);

    /// Evaluate the step against the prepared turn. Errors are caught at the
    /// orchestrator boundary and collapse the whole chain to a
    /// not-authenticated outcome.
    fn evaluate(&mut self) -> Result<StepStatus, Error>;

    /// Identity established by this step, after a successful evaluation.
    fn identity(&self) -> Option<&Identity> {
        None
    }

    /// Credential material captured by this step, after a successful
    /// evaluation.
    fn credentials(&self) -> Option<&Credentials> {
        None
    }

    /// Page to render, after [`StepStatus::AwaitingInteraction`].
    fn page_to_show(&self) -> Option<&PageDescriptor> {
        None
    }

    /// Expiry caveat, after [`StepStatus::ConditionallyAuthenticated`].
    fn password_expiry(&self) -> Option<&PasswordExpiry> {
        None
    }

    /// Identity whose password is expiring, after
    /// [`StepStatus::ConditionallyAuthenticated`].
    fn expired_identity(&self) -> Option<&Identity> {
        None
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{PageDescriptor, TurnContext};

    #[test]
    fn turn_context_carries_params_attributes_and_return_url() {
        let turn = TurnContext::new()
            .with_param("user", "alice")
            .with_attribute("session-id", "abc123")
            .with_return_url("https://app.example.com/portal");

        assert_eq!(turn.param("user"), Some(&json!("alice")));
        assert_eq!(turn.param_str("user"), Some("alice"));
        assert_eq!(turn.attribute("session-id"), Some(&json!("abc123")));
        assert_eq!(turn.return_url(), Some("https://app.example.com/portal"));
        assert!(turn.attribute("missing").is_none());
    }

    #[test]
    fn empty_turn_has_no_return_url() {
        let turn = TurnContext::new();
        assert!(turn.return_url().is_none());
        assert!(turn.param_str("secret").is_none());
    }

    #[test]
    fn page_descriptor_exposes_its_attributes() {
        let page = PageDescriptor::named("otp-entry").with_attribute("digits", 6);
        assert_eq!(page.name(), "otp-entry");
        assert_eq!(page.attribute("digits"), Some(&json!(6)));
    }
}
