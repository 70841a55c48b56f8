//! Shared-secret step: prompts for a secret on the first interaction and
//! verifies the submission when the chain resumes.
//!
//! The smallest step with real pause/resume semantics. A turn without the
//! `secret` request parameter yields a page to render; the next turn carries
//! the submission and decides the outcome. The identity comes from the
//! `user` request parameter, falling back to a principal established earlier
//! in the chain (the merged `Principal` property).

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::chain::config::{PropertyBag, PRINCIPAL_PROPERTY};
use crate::error::Error;
use crate::principal::{Credentials, Identity};
use crate::step::{AuthStep, PageDescriptor, StepStatus, TurnContext};

/// Required property holding the expected secret.
pub const SECRET_PROPERTY: &str = "Secret";
/// Optional property naming the page to render when prompting.
pub const PAGE_PROPERTY: &str = "Page";
/// Request parameter carrying the submitted secret.
pub const SECRET_PARAM: &str = "secret";
/// Request parameter carrying the submitted user identifier.
pub const USER_PARAM: &str = "user";

const DEFAULT_PAGE: &str = "login";

pub struct SecretStep {
    expected: SecretString,
    page: PageDescriptor,
    /// Principal established by an earlier step in the same chain, if any.
    chained_principal: Option<Identity>,
    submitted_secret: Option<String>,
    submitted_user: Option<String>,
    identity: Option<Identity>,
    credentials: Option<Credentials>,
    page_to_show: Option<PageDescriptor>,
}

impl SecretStep {
    /// Fails with [`Error::MissingProperty`] when the `Secret` property is
    /// absent or empty, which chain validation turns into a dropped
    /// declaration.
    pub fn from_properties(properties: &PropertyBag) -> Result<Self, Error> {
        let expected = properties
            .get(SECRET_PROPERTY)
            .and_then(Value::as_str)
            .filter(|secret| !secret.is_empty())
            .ok_or(Error::MissingProperty(SECRET_PROPERTY))?;
        let page = PageDescriptor::named(
            properties
                .get(PAGE_PROPERTY)
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_PAGE),
        );
        let chained_principal = properties
            .get(PRINCIPAL_PROPERTY)
            .and_then(|value| serde_json::from_value(value.clone()).ok());
        Ok(Self {
            expected: SecretString::from(expected.to_string()),
            page,
            chained_principal,
            submitted_secret: None,
            submitted_user: None,
            identity: None,
            credentials: None,
            page_to_show: None,
        })
    }
}

impl AuthStep for SecretStep {
    fn prepare(&mut self, turn: &TurnContext, _first_call: bool) {
        self.submitted_secret = turn.param_str(SECRET_PARAM).map(str::to_string);
        self.submitted_user = turn.param_str(USER_PARAM).map(str::to_string);
    }

    fn evaluate(&mut self) -> Result<StepStatus, Error> {
        let Some(submitted) = self.submitted_secret.take() else {
            debug!("No secret submitted, prompting for `{}`", self.page.name());
            self.page_to_show = Some(self.page.clone());
            return Ok(StepStatus::AwaitingInteraction);
        };
        if constant_time_eq(submitted.as_bytes(), self.expected.expose_secret().as_bytes()) {
            self.identity = self
                .submitted_user
                .take()
                .map(Identity::new)
                .or_else(|| self.chained_principal.clone());
            self.credentials = Some(Credentials::new(submitted));
            match &self.identity {
                Some(identity) => info!("Secret step authenticated `{}`", identity.id()),
                None => info!("Secret step authenticated without a principal"),
            }
            Ok(StepStatus::Authenticated)
        } else {
            warn!("Submitted secret did not match");
            Ok(StepStatus::NotAuthenticated)
        }
    }

    fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    fn page_to_show(&self) -> Option<&PageDescriptor> {
        self.page_to_show.as_ref()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{constant_time_eq, SecretStep, PAGE_PROPERTY, SECRET_PARAM, SECRET_PROPERTY, USER_PARAM};
    use crate::chain::config::PropertyBag;
    use crate::error::Error;
    use crate::step::{AuthStep, StepStatus, TurnContext};

    fn properties(secret: &str) -> PropertyBag {
        let mut bag = PropertyBag::new();
        bag.insert(SECRET_PROPERTY.to_string(), json!(secret));
        bag
    }

    #[test]
    fn requires_the_secret_property() {
        match SecretStep::from_properties(&PropertyBag::new()) {
            Err(Error::MissingProperty(name)) => assert_eq!(name, SECRET_PROPERTY),
            _ => panic!("expected missing property error"),
        }
    }

    #[test]
    fn prompts_until_a_secret_is_submitted() {
        let mut bag = properties("s3cret");
        bag.insert(PAGE_PROPERTY.to_string(), json!("token-entry"));
        let mut step = SecretStep::from_properties(&bag).expect("construct");

        step.prepare(&TurnContext::new(), true);
        assert_eq!(step.evaluate().expect("evaluate"), StepStatus::AwaitingInteraction);
        assert_eq!(step.page_to_show().map(|p| p.name()), Some("token-entry"));

        let resume = TurnContext::new()
            .with_param(SECRET_PARAM, "s3cret")
            .with_param(USER_PARAM, "alice");
        step.prepare(&resume, false);
        assert_eq!(step.evaluate().expect("evaluate"), StepStatus::Authenticated);
        assert_eq!(step.identity().map(|i| i.id()), Some("alice"));
        assert!(step.credentials().is_some());
    }

    #[test]
    fn rejects_a_wrong_secret() {
        let mut step = SecretStep::from_properties(&properties("s3cret")).expect("construct");
        let turn = TurnContext::new().with_param(SECRET_PARAM, "guess");
        step.prepare(&turn, true);
        assert_eq!(step.evaluate().expect("evaluate"), StepStatus::NotAuthenticated);
        assert!(step.identity().is_none());
    }

    #[test]
    fn comparison_handles_length_mismatch() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(constant_time_eq(b"", b""));
    }
}
