//! Chain configuration: parsing the flat property bag into an ordered list
//! of step declarations, and scoping per-step property bags.
//!
//! Configuration format (all keys in one flat bag):
//! - `Class_<n>` declares the step at ordinal `<n>`; the value is the step
//!   name (a well-known alias or a canonical step id).
//! - `Class_<n>_<name>` is a property visible only to step `<n>`, under the
//!   bare name `<name>`.
//! - `MODE` selects the combination mode (`AND` or `OR`, default `OR`).
//! - `DEBUG` enables verbose chain logging (default off).
//! - Every remaining key is a global property shared by all steps.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::registry;

/// Flat string-keyed property bag shared by the chain and its steps.
pub type PropertyBag = serde_json::Map<String, Value>;

/// Property selecting the chain combination mode.
pub const MODE_PROPERTY: &str = "MODE";
/// Property enabling verbose chain logging. Unlike `MODE`, this one also
/// stays in the globals so it propagates to child steps.
pub const DEBUG_PROPERTY: &str = "DEBUG";
/// Global property under which an established principal is re-exposed to
/// steps that are constructed later in the same chain.
pub const PRINCIPAL_PROPERTY: &str = "Principal";

static STEP_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Class_(\d+)$").expect("valid step key pattern"));
static SCOPED_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(Class_\d+)_(.+)$").expect("valid scoped key pattern"));

/// Chain combination mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChainMode {
    /// Every step has to succeed, in order.
    And,
    /// The first step that succeeds wins; failures fall through.
    Or,
}

impl ChainMode {
    fn from_property(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some(raw) if raw.eq_ignore_ascii_case("AND") => Self::And,
            Some(raw) if raw.eq_ignore_ascii_case("OR") => Self::Or,
            Some(other) => {
                warn!("Unknown chain mode `{other}`, falling back to OR");
                Self::Or
            }
            None => Self::Or,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// One configured step, after parsing and alias resolution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StepDeclaration {
    /// Configuration key that declared this step (`Class_<n>`); unique, and
    /// the sort key for chain order.
    pub ordinal_key: String,
    /// Step name exactly as configured.
    pub declared_name: String,
    /// Declared name after alias resolution; identical to `declared_name`
    /// when the name is not a known alias.
    pub resolved_name: String,
    /// Raw scoped entries for this step, keyed by bare property name.
    pub scoped_properties: PropertyBag,
}

/// Immutable chain configuration, built once at orchestrator construction.
#[derive(Clone, Debug)]
pub struct ChainConfig {
    mode: ChainMode,
    debug: bool,
    globals: PropertyBag,
    steps: Vec<StepDeclaration>,
}

impl ChainConfig {
    #[must_use]
    pub fn new(mode: ChainMode, debug: bool, globals: PropertyBag, steps: Vec<StepDeclaration>) -> Self {
        Self {
            mode,
            debug,
            globals,
            steps,
        }
    }

    /// Parse a flat property bag into a chain configuration.
    ///
    /// Null-valued entries are skipped with a warning instead of failing the
    /// whole configuration; hosts have been known to ship them.
    #[must_use]
    pub fn parse(raw: &PropertyBag) -> Self {
        let mut declarations: Vec<(String, String)> = Vec::new();
        let mut scoped: HashMap<String, PropertyBag> = HashMap::new();
        let mut globals = PropertyBag::new();

        for (key, value) in raw {
            if value.is_null() {
                warn!("Skipping null-valued property `{key}`");
                continue;
            }
            if is_step_key(key) {
                match value.as_str() {
                    Some(name) => {
                        debug!("Recognized step declaration `{key}` = `{name}`");
                        declarations.push((key.clone(), name.to_string()));
                    }
                    None => warn!("Step declaration `{key}` is not a string, dropping it"),
                }
            } else if let Some((prefix, name)) = split_scoped_key(key) {
                debug!("Recognized step-scoped property `{key}`");
                scoped
                    .entry(prefix.to_string())
                    .or_default()
                    .insert(name.to_string(), value.clone());
            } else if key != MODE_PROPERTY {
                debug!("Recognized global property `{key}`");
                globals.insert(key.clone(), value.clone());
            }
        }

        let mode = ChainMode::from_property(raw.get(MODE_PROPERTY));
        let debug_enabled = raw.get(DEBUG_PROPERTY).is_some_and(truthy);

        // Ordinal keys sort as strings, so `Class_10` orders before `Class_2`.
        // Deployed configurations depend on the lexical order; do not change
        // this to a numeric sort.
        declarations.sort_by(|a, b| a.0.cmp(&b.0));

        let steps = declarations
            .into_iter()
            .map(|(ordinal_key, declared_name)| {
                let resolved_name = registry::resolve_alias(&declared_name).to_string();
                let scoped_properties = scoped.remove(&ordinal_key).unwrap_or_default();
                StepDeclaration {
                    ordinal_key,
                    declared_name,
                    resolved_name,
                    scoped_properties,
                }
            })
            .collect();

        Self {
            mode,
            debug: debug_enabled,
            globals,
            steps,
        }
    }

    #[must_use]
    pub fn mode(&self) -> ChainMode {
        self.mode
    }

    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    #[must_use]
    pub fn globals(&self) -> &PropertyBag {
        &self.globals
    }

    #[must_use]
    pub fn steps(&self) -> &[StepDeclaration] {
        &self.steps
    }

    pub(crate) fn into_parts(self) -> (ChainMode, bool, PropertyBag, Vec<StepDeclaration>) {
        (self.mode, self.debug, self.globals, self.steps)
    }
}

/// Build the exact property bag one step instance receives: the globals,
/// overlaid by the step's own scoped entries. Collisions resolve in favor of
/// the scoped value.
#[must_use]
pub fn scope(declaration: &StepDeclaration, globals: &PropertyBag) -> PropertyBag {
    let mut merged = globals.clone();
    for (name, value) in &declaration.scoped_properties {
        if let Some(previous) = merged.insert(name.clone(), value.clone()) {
            debug!("Scoped property `{name}` overrides global value {previous:?}");
        }
    }
    merged
}

fn is_step_key(key: &str) -> bool {
    STEP_KEY.is_match(key)
}

fn split_scoped_key(key: &str) -> Option<(&str, &str)> {
    let captures = SCOPED_KEY.captures(key)?;
    match (captures.get(1), captures.get(2)) {
        (Some(prefix), Some(name)) => Some((prefix.as_str(), name.as_str())),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(raw) => raw.eq_ignore_ascii_case("true"),
        _ => false,
    }
}
