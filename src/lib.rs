//! # Catena (Chained Authentication Orchestrator)
//!
//! `catena` decomposes a login into an ordered sequence of pluggable
//! authentication **steps** (password check, one-time code, certificate
//! check, ...) and drives them to a single decision, possibly across
//! multiple HTTP round trips.
//!
//! ## Chains and Modes
//!
//! A **chain** is declared in a flat property bag: `Class_<n>` keys name the
//! steps in order, `Class_<n>_<prop>` keys scope properties to one step, and
//! everything else is shared by all steps. The `MODE` key selects the
//! combination semantics:
//!
//! - **`AND`** — every step has to succeed, in order (a regular contract).
//! - **`OR`** — the first step that succeeds wins; failures fall through
//!   (the default).
//!
//! ## Pause and Resume
//!
//! A step may request user interaction (render a form, wait for the
//! submission). The chain then *pauses*: [`ChainOrchestrator::execute`]
//! returns [`ChainResult::AwaitingInteraction`] and the next call — an
//! entirely separate invocation for the same login attempt — resumes the
//! same step instance where it left off. Keep one orchestrator per login
//! attempt alive (e.g. in the host's session map) for as long as the
//! attempt runs; never share it across concurrent attempts.
//!
//! ## Steps
//!
//! Steps implement [`AuthStep`] and are built by name through a
//! [`StepRegistry`] of factory closures — an explicit closed set, populated
//! at startup. The orchestrator itself implements [`AuthStep`], so chains
//! nest: a whole chain can be one step of another chain.
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use catena::{ChainOrchestrator, ChainResult, PropertyBag, StepRegistry, TurnContext};
//!
//! let mut properties = PropertyBag::new();
//! properties.insert("MODE".into(), json!("OR"));
//! properties.insert("Class_0".into(), json!("Deny"));
//! properties.insert("Class_1".into(), json!("Allow"));
//! properties.insert("Class_1_AnonymousUser".into(), json!("cn=guest,o=example"));
//!
//! let registry = Arc::new(StepRegistry::builtin());
//! let mut chain = ChainOrchestrator::new(properties, Arc::from(Vec::new()), registry);
//! match chain.execute(&TurnContext::new()) {
//!     ChainResult::Authenticated { identity, .. } => {
//!         assert_eq!(identity.map(|i| i.id().to_string()).as_deref(), Some("cn=guest,o=example"));
//!     }
//!     other => panic!("unexpected outcome: {other:?}"),
//! }
//! ```

pub mod chain;
pub mod error;
pub mod principal;
pub mod registry;
pub mod step;
pub mod steps;

pub use chain::config::{ChainConfig, ChainMode, PropertyBag, StepDeclaration};
pub use chain::{ChainOrchestrator, ChainResult, CHAIN_STEP_ID};
pub use error::Error;
pub use principal::{Credentials, Identity, PasswordExpiry, UserStoreHandle};
pub use registry::{resolve_alias, FactoryContext, StepRegistry};
pub use step::{AuthStep, PageDescriptor, StepStatus, TurnContext};
