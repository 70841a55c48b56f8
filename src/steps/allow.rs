//! Fallback step that always authenticates.
//!
//! Useful where authentication is optional (a public landing page, say) or
//! as the last resort in an OR chain. With the `AnonymousUser` property set,
//! that user is asserted as the principal; the reference is not verified
//! against a user store, which hosts that care should do in a step of their
//! own. Without it, a throwaway principal is generated, and whether the host
//! accepts that depends on its settings.

use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::chain::config::PropertyBag;
use crate::error::Error;
use crate::principal::Identity;
use crate::step::{AuthStep, StepStatus, TurnContext};

/// Optional property naming the principal to assert.
pub const ANONYMOUS_USER_PROPERTY: &str = "AnonymousUser";

pub struct AllowStep {
    anonymous_user: Option<String>,
    identity: Option<Identity>,
}

impl AllowStep {
    #[must_use]
    pub fn from_properties(properties: &PropertyBag) -> Self {
        let anonymous_user = properties
            .get(ANONYMOUS_USER_PROPERTY)
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        Self {
            anonymous_user,
            identity: None,
        }
    }
}

impl AuthStep for AllowStep {
    fn prepare(&mut self, _turn: &TurnContext, _first_call: bool) {}

    fn evaluate(&mut self) -> Result<StepStatus, Error> {
        let identity = match &self.anonymous_user {
            Some(user) => Identity::new(user.clone()),
            None => Identity::new(format!("anonymous-{}", Uuid::new_v4().simple())),
        };
        info!("Allow step authenticated as `{}`", identity.id());
        self.identity = Some(identity);
        Ok(StepStatus::Authenticated)
    }

    fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }
}
