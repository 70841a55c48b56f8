//! The chain orchestrator: a resumable state machine over an ordered list of
//! authentication steps.
//!
//! One orchestrator is created per login attempt and driven with one
//! [`ChainOrchestrator::execute`] call per external round trip. A step that
//! needs user interaction pauses the chain: the orchestrator returns to its
//! caller and the next call resumes the same step instance exactly where it
//! left off. The orchestrator itself satisfies the step contract, so a whole
//! chain can be registered as a step inside another chain.

pub mod config;
pub(crate) mod state;


use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::error::Error;
use crate::principal::{Credentials, Identity, PasswordExpiry, UserStoreHandle};
use crate::registry::{FactoryContext, StepRegistry};
use crate::step::{AuthStep, PageDescriptor, StepStatus, TurnContext};

use config::{ChainConfig, ChainMode, PropertyBag, PRINCIPAL_PROPERTY};
use state::ExecutionState;

/// Canonical id under which the orchestrator registers as a step of its own,
/// enabling nested chains.
pub const CHAIN_STEP_ID: &str = "secure.login.chain";

/// Outcome of one orchestrator invocation.
///
/// The identity is optional even on success: a step may authenticate without
/// establishing a concrete principal (the anonymous allow step with no
/// configured user, for instance).
#[derive(Clone, Debug)]
pub enum ChainResult {
    Authenticated {
        identity: Option<Identity>,
        credentials: Option<Credentials>,
    },
    NotAuthenticated,
    AwaitingInteraction(PageDescriptor),
    ConditionallyAuthenticated {
        identity: Option<Identity>,
        expiry: Option<PasswordExpiry>,
    },
    Other(i32),
}

/// Everything the mode loops need from a step after one evaluation, captured
/// before the mutable borrow on the step ends.
struct Observation {
    status: StepStatus,
    identity: Option<Identity>,
    credentials: Option<Credentials>,
    page: Option<PageDescriptor>,
    expiry: Option<PasswordExpiry>,
    expired_identity: Option<Identity>,
}

impl Observation {
    fn capture(status: StepStatus, step: &dyn AuthStep) -> Self {
        Self {
            status,
            identity: step.identity().cloned(),
            credentials: step.credentials().cloned(),
            page: step.page_to_show().cloned(),
            expiry: step.password_expiry().cloned(),
            expired_identity: step.expired_identity().cloned(),
        }
    }
}

/// Drives an ordered list of steps to a login decision, one invocation at a
/// time. Owns the immutable [`ChainConfig`] and the mutable
/// [`ExecutionState`] of a single login attempt; never share one instance
/// across concurrent attempts.
pub struct ChainOrchestrator {
    config: ChainConfig,
    registry: Arc<StepRegistry>,
    user_stores: Arc<[UserStoreHandle]>,
    state: ExecutionState,
    /// Runtime view of the globals; receives the `Principal` entry as steps
    /// succeed, so later steps are constructed with it in scope.
    globals: PropertyBag,
    identity: Option<Identity>,
    credentials: Option<Credentials>,
    page_to_show: Option<PageDescriptor>,
    password_expiry: Option<PasswordExpiry>,
    expired_identity: Option<Identity>,
    /// Turn handed over through the step contract when this chain runs
    /// nested inside another chain.
    pending_turn: Option<TurnContext>,
}

impl ChainOrchestrator {
    /// Parse the raw property bag and build an orchestrator. Declarations
    /// that fail validation are dropped with a warning, never fatally.
    #[must_use]
    pub fn new(
        properties: PropertyBag,
        user_stores: Arc<[UserStoreHandle]>,
        registry: Arc<StepRegistry>,
    ) -> Self {
        let config = ChainConfig::parse(&properties);
        Self::from_config(config, user_stores, registry)
    }

    /// Build an orchestrator from an already-parsed configuration.
    #[must_use]
    pub fn from_config(
        config: ChainConfig,
        user_stores: Arc<[UserStoreHandle]>,
        registry: Arc<StepRegistry>,
    ) -> Self {
        let config = Self::validate_steps(config, &user_stores, &registry);
        let globals = config.globals().clone();
        Self {
            config,
            registry,
            user_stores,
            state: ExecutionState::new(),
            globals,
            identity: None,
            credentials: None,
            page_to_show: None,
            password_expiry: None,
            expired_identity: None,
            pending_turn: None,
        }
    }

    /// Prove every declaration instantiates, dropping the ones that do not.
    /// The probe instances are discarded; execution builds fresh ones.
    fn validate_steps(
        config: ChainConfig,
        user_stores: &Arc<[UserStoreHandle]>,
        registry: &Arc<StepRegistry>,
    ) -> ChainConfig {
        info!("Validating {} configured authentication steps", config.steps().len());
        let (mode, debug_enabled, globals, steps) = config.into_parts();
        let steps = steps
            .into_iter()
            .filter(|declaration| {
                let merged = config::scope(declaration, &globals);
                let context = FactoryContext {
                    properties: &merged,
                    user_stores: Arc::clone(user_stores),
                    registry: Arc::clone(registry),
                };
                match registry.create(&declaration.resolved_name, &context) {
                    Ok(_) => true,
                    Err(err) => {
                        warn!(
                            "Dropping step `{}` ({}): {err}",
                            declaration.ordinal_key, declaration.declared_name
                        );
                        false
                    }
                }
            })
            .collect();
        ChainConfig::new(mode, debug_enabled, globals, steps)
    }

    #[must_use]
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Drive the chain one turn. Call once per external interaction with the
    /// login attempt; returns either a terminal decision or a pause.
    #[instrument(skip(self, turn), fields(mode = self.config.mode().as_str()))]
    pub fn execute(&mut self, turn: &TurnContext) -> ChainResult {
        if self.state.started {
            info!("Resuming authentication chain at step {}", self.state.position);
        } else {
            self.state.started = true;
            self.state.position = 0;
            self.state.pending_new_instance = true;
            info!(
                "Starting authentication chain with {} steps",
                self.config.steps().len()
            );
        }
        match self.config.mode() {
            ChainMode::And => self.run_and(turn),
            ChainMode::Or => self.run_or(turn),
        }
    }

    /// AND mode: every step has to succeed, in order. Fails fast.
    fn run_and(&mut self, turn: &TurnContext) -> ChainResult {
        let mut last = StepStatus::NotAuthenticated;
        while self.state.position < self.config.steps().len() {
            let position = self.state.position;
            let observed = match self.step_turn(turn) {
                Ok(observed) => observed,
                Err(err) => return self.chain_fatal(position, &err),
            };
            match observed.status {
                StepStatus::NotAuthenticated => {
                    debug!("Step {position} authentication failed");
                    self.state.pending_new_instance = true;
                    return ChainResult::NotAuthenticated;
                }
                StepStatus::Authenticated => {
                    debug!("Step {position} authentication succeeded");
                    self.merge_principal(&observed, false);
                    self.state.advance();
                }
                StepStatus::AwaitingInteraction => return self.pause(position, observed),
                StepStatus::ConditionallyAuthenticated => {
                    debug!("Step {position} succeeded conditionally (password expiring)");
                    self.merge_principal(&observed, true);
                    self.state.advance();
                }
                StepStatus::Other(code) => {
                    debug!("Step {position} failed with status {code}");
                    self.state.pending_new_instance = true;
                    return ChainResult::Other(code);
                }
            }
            last = observed.status;
        }
        match last {
            StepStatus::Authenticated => ChainResult::Authenticated {
                identity: self.identity.clone(),
                credentials: self.credentials.clone(),
            },
            StepStatus::ConditionallyAuthenticated => ChainResult::ConditionallyAuthenticated {
                identity: self.identity.clone(),
                expiry: self.password_expiry.clone(),
            },
            // Empty chain: nothing ever succeeded.
            _ => ChainResult::NotAuthenticated,
        }
    }

    /// OR mode: the first step that succeeds wins; failures and pass-through
    /// statuses fall through to the next step. On exhaustion the last
    /// observed status stands, so a trailing pass-through code survives.
    fn run_or(&mut self, turn: &TurnContext) -> ChainResult {
        let mut last = StepStatus::NotAuthenticated;
        while self.state.position < self.config.steps().len() {
            let position = self.state.position;
            let observed = match self.step_turn(turn) {
                Ok(observed) => observed,
                Err(err) => return self.chain_fatal(position, &err),
            };
            match observed.status {
                StepStatus::NotAuthenticated => {
                    debug!("Step {position} authentication failed, trying next");
                    self.state.advance();
                }
                StepStatus::Authenticated => {
                    debug!("Step {position} authentication succeeded");
                    self.merge_principal(&observed, false);
                    self.state.pending_new_instance = true;
                    return ChainResult::Authenticated {
                        identity: self.identity.clone(),
                        credentials: self.credentials.clone(),
                    };
                }
                StepStatus::AwaitingInteraction => return self.pause(position, observed),
                StepStatus::ConditionallyAuthenticated => {
                    debug!("Step {position} succeeded conditionally (password expiring)");
                    self.merge_principal(&observed, true);
                    self.state.pending_new_instance = true;
                    return ChainResult::ConditionallyAuthenticated {
                        identity: self.identity.clone(),
                        expiry: self.password_expiry.clone(),
                    };
                }
                StepStatus::Other(code) => {
                    debug!("Step {position} failed with status {code}, trying next");
                    self.state.advance();
                }
            }
            last = observed.status;
        }
        debug!("Every step in the chain failed");
        match last {
            StepStatus::Other(code) => ChainResult::Other(code),
            _ => ChainResult::NotAuthenticated,
        }
    }

    /// Instantiate (when needed), prepare, and evaluate the step at the
    /// current position. Construction and evaluation failures both surface
    /// here and terminate the chain in the caller.
    fn step_turn(&mut self, turn: &TurnContext) -> Result<Observation, Error> {
        let first_call = self.state.pending_new_instance;
        if self.state.pending_new_instance || self.state.current_step.is_none() {
            let declaration = &self.config.steps()[self.state.position];
            let merged = config::scope(declaration, &self.globals);
            if self.config.debug() {
                debug!(
                    "Step {} (`{}`) receives {} merged properties",
                    self.state.position,
                    declaration.resolved_name,
                    merged.len()
                );
            }
            let context = FactoryContext {
                properties: &merged,
                user_stores: Arc::clone(&self.user_stores),
                registry: Arc::clone(&self.registry),
            };
            let step = self.registry.create(&declaration.resolved_name, &context)?;
            self.state.current_step = Some(step);
        }
        let Some(step) = self.state.current_step.as_mut() else {
            return Err(Error::Step("no current step instance".to_string()));
        };
        step.prepare(turn, first_call);
        let status = step.evaluate()?;
        Ok(Observation::capture(status, step.as_ref()))
    }

    /// A step raised an error; the chain never propagates it to the caller.
    fn chain_fatal(&mut self, position: usize, err: &Error) -> ChainResult {
        error!("Step {position} failed, chain terminates: {err}");
        self.state.pending_new_instance = true;
        ChainResult::NotAuthenticated
    }

    fn pause(&mut self, position: usize, observed: Observation) -> ChainResult {
        debug!("Step {position} requires interaction, pausing chain");
        self.page_to_show = observed.page.clone();
        self.state.pending_new_instance = false;
        ChainResult::AwaitingInteraction(observed.page.unwrap_or_default())
    }

    /// Publish a step's principal into chain-level state and the runtime
    /// globals, making it visible to steps constructed later in this chain.
    fn merge_principal(&mut self, observed: &Observation, expired: bool) {
        if expired {
            self.password_expiry = observed.expiry.clone();
            self.expired_identity = observed.expired_identity.clone();
        } else {
            self.credentials = observed.credentials.clone();
        }
        match &observed.identity {
            Some(identity) => {
                debug!("Step identified principal `{}`", identity.id());
                match serde_json::to_value(identity) {
                    Ok(value) => {
                        self.globals.insert(PRINCIPAL_PROPERTY.to_string(), value);
                    }
                    Err(err) => warn!("Could not expose principal to later steps: {err}"),
                }
                self.identity = Some(identity.clone());
            }
            None => debug!("Step identified no principal"),
        }
    }
}

/// The orchestrator satisfies the same contract it consumes, so a chain can
/// nest as a step inside another chain without special-casing.
impl AuthStep for ChainOrchestrator {
    fn prepare(&mut self, turn: &TurnContext, _first_call: bool) {
        // The chain tracks first-interaction state per inner step on its own.
        self.pending_turn = Some(turn.clone());
    }

    fn evaluate(&mut self) -> Result<StepStatus, Error> {
        let turn = self.pending_turn.take().unwrap_or_default();
        let status = match self.execute(&turn) {
            ChainResult::Authenticated { .. } => StepStatus::Authenticated,
            ChainResult::NotAuthenticated => StepStatus::NotAuthenticated,
            ChainResult::AwaitingInteraction(_) => StepStatus::AwaitingInteraction,
            ChainResult::ConditionallyAuthenticated { .. } => StepStatus::ConditionallyAuthenticated,
            ChainResult::Other(code) => StepStatus::Other(code),
        };
        Ok(status)
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

    fn password_expiry(&self) -> Option<&PasswordExpiry> {
        self.password_expiry.as_ref()
    }

    fn expired_identity(&self) -> Option<&Identity> {
        self.expired_identity.as_ref()
    }
}
