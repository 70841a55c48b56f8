//! Built-in authentication steps.
//!
//! These are the simple steps the registry ships with: unconditional allow
//! and deny fallbacks, and a shared-secret step that exercises the full
//! pause/resume cycle. Real deployments register richer steps (password,
//! RADIUS, certificate, ...) alongside them.

mod allow;
mod deny;
mod secret;

pub use allow::{AllowStep, ANONYMOUS_USER_PROPERTY};
pub use deny::DenyStep;
pub use secret::{SecretStep, PAGE_PROPERTY, SECRET_PARAM, SECRET_PROPERTY, USER_PARAM};

/// Canonical id of the always-succeed fallback step.
pub const ALLOW_STEP_ID: &str = "secure.login.allow";
/// Canonical id of the always-fail fallback step.
pub const DENY_STEP_ID: &str = "secure.login.deny";
/// Canonical id of the shared-secret step.
pub const SECRET_STEP_ID: &str = "secure.login.secret";
