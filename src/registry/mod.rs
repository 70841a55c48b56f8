//! Step registry and well-known name aliases.
//!
//! Steps are instantiated from configuration by name. Instead of dynamic
//! class lookup, the registry holds an explicit closed set of factory
//! closures, populated at startup; hosts register their own steps next to
//! the built-ins. Alias resolution maps the short names operators actually
//! type to canonical step ids, and passes unknown names through unchanged.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::chain::config::PropertyBag;
use crate::error::Error;
use crate::principal::UserStoreHandle;
use crate::step::AuthStep;

/// Short, well-known step names and the canonical ids they stand for.
/// Not every alias has a factory in [`StepRegistry::builtin`]; names whose
/// implementation is host-provided resolve here and fail chain validation
/// until the host registers them.
const ALIASES: &[(&str, &str)] = &[
    ("Allow", crate::steps::ALLOW_STEP_ID),
    ("Deny", crate::steps::DENY_STEP_ID),
    ("SecretClass", crate::steps::SECRET_STEP_ID),
    ("ChainedAuth", crate::chain::CHAIN_STEP_ID),
    ("BasicClass", "secure.login.basic"),
    ("PasswordClass", "secure.login.password"),
    ("RadiusClass", "secure.login.radius"),
    ("TOTPClass", "secure.login.totp"),
    ("X509Class", "secure.login.x509"),
    ("KerberosClass", "secure.login.kerberos"),
];

/// Resolve a configured step name against the alias table. Unknown names
/// pass through unchanged; resolution never fails.
#[must_use]
pub fn resolve_alias(name: &str) -> &str {
    ALIASES
        .iter()
        .find(|(short, _)| *short == name)
        .map_or(name, |(_, canonical)| *canonical)
}

/// Everything a factory needs to build one step instance.
pub struct FactoryContext<'a> {
    /// Merged property bag for this step (globals overlaid by scoped entries).
    pub properties: &'a PropertyBag,
    /// Shared, read-only credential backends.
    pub user_stores: Arc<[UserStoreHandle]>,
    /// The registry itself, so composite steps can build their children.
    pub registry: Arc<StepRegistry>,
}

type StepFactory = Box<dyn Fn(&FactoryContext<'_>) -> Result<Box<dyn AuthStep>, Error> + Send + Sync>;

/// Closed set of step factories, keyed by canonical step id.
#[derive(Default)]
pub struct StepRegistry {
    factories: HashMap<String, StepFactory>,
}

impl StepRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every step this crate ships, including the chain
    /// orchestrator itself so chains can nest.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(crate::steps::ALLOW_STEP_ID, |context| {
            Ok(Box::new(crate::steps::AllowStep::from_properties(context.properties)))
        });
        registry.register(crate::steps::DENY_STEP_ID, |_context| {
            Ok(Box::new(crate::steps::DenyStep))
        });
        registry.register(crate::steps::SECRET_STEP_ID, |context| {
            Ok(Box::new(crate::steps::SecretStep::from_properties(context.properties)?))
        });
        registry.register(crate::chain::CHAIN_STEP_ID, |context| {
            Ok(Box::new(crate::chain::ChainOrchestrator::new(
                context.properties.clone(),
                Arc::clone(&context.user_stores),
                Arc::clone(&context.registry),
            )))
        });
        registry
    }

    /// Register a factory under a canonical step id, replacing any previous
    /// registration for the same id.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn(&FactoryContext<'_>) -> Result<Box<dyn AuthStep>, Error> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Box::new(factory));
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Build a step instance. Fails with [`Error::StepConstruction`] carrying
    /// the step name when the id is unknown or the factory rejects its
    /// configuration.
    pub fn create(
        &self,
        resolved_name: &str,
        context: &FactoryContext<'_>,
    ) -> Result<Box<dyn AuthStep>, Error> {
        let factory = self.factories.get(resolved_name).ok_or_else(|| {
            Error::construction(resolved_name, "no factory registered for this step")
        })?;
        debug!("Instantiating authentication step `{resolved_name}`");
        factory(context).map_err(|source| match source {
            already @ Error::StepConstruction { .. } => already,
            other => Error::construction(resolved_name, other.to_string()),
        })
    }
}
