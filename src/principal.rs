//! Principals, credential material, and user-store handles.
//!
//! An [`Identity`] is the authenticated-user record a step produces on
//! success. The orchestrator merges it into chain-level state and re-exposes
//! it to later steps through the shared property bag, so it has to be serde
//! round-trippable. Credential material is wrapped in [`Credentials`] so it
//! never leaks through `Debug` output or logs.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chain::config::PropertyBag;

/// Authenticated-user record produced by a successful step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    attributes: PropertyBag,
}

impl Identity {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            attributes: PropertyBag::new(),
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// Secret material associated with an authenticated identity.
///
/// The inner secret is redacted from `Debug` output; callers that genuinely
/// need the raw value go through [`Credentials::expose_secret`].
#[derive(Clone)]
pub struct Credentials {
    secret: SecretString,
}

impl Credentials {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: SecretString::from(secret.into()),
        }
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        self.secret.expose_secret()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(<redacted>)")
    }
}

/// Caveat attached to a conditionally successful authentication, typically a
/// password nearing expiry.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PasswordExpiry {
    days_to_expiry: u32,
    message: String,
}

impl PasswordExpiry {
    #[must_use]
    pub fn new(days_to_expiry: u32, message: impl Into<String>) -> Self {
        Self {
            days_to_expiry,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn days_to_expiry(&self) -> u32 {
        self.days_to_expiry
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Opaque handle to a credential backend, passed read-only to every step at
/// construction. The orchestrator never interprets the settings; steps that
/// talk to a real backend know what to look for.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserStoreHandle {
    name: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    settings: PropertyBag,
}

impl UserStoreHandle {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: PropertyBag::new(),
        }
    }

    #[must_use]
    pub fn with_setting(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn setting(&self, name: &str) -> Option<&Value> {
        self.settings.get(name)
    }
}
