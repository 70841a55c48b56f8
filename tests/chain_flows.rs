//! End-to-end chain scenarios using the built-in steps, exercising the
//! public surface the way a host identity provider would: build one
//! orchestrator per login attempt and drive it with one turn per round trip.

use std::sync::{Arc, Once};

use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use catena::{
    AuthStep, ChainOrchestrator, ChainResult, PropertyBag, StepRegistry, TurnContext,
    UserStoreHandle,
};

static TRACING: Once = Once::new();

/// Chain logging goes through the host's subscriber; run the suite with
/// `RUST_LOG=catena=debug` to watch the state machine.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn bag(entries: &[(&str, Value)]) -> PropertyBag {
    entries
        .iter()
        .map(|(key, value)| ((*key).to_string(), value.clone()))
        .collect()
}

fn chain(properties: PropertyBag) -> ChainOrchestrator {
    init_tracing();
    let stores: Arc<[UserStoreHandle]> = Arc::from(vec![UserStoreHandle::new("directory")]);
    ChainOrchestrator::new(properties, stores, Arc::new(StepRegistry::builtin()))
}

#[test]
fn or_chain_falls_through_deny_to_allow() {
    let mut login = chain(bag(&[
        ("MODE", json!("OR")),
        ("Class_0", json!("Deny")),
        ("Class_1", json!("Allow")),
        ("Class_1_AnonymousUser", json!("cn=guest,o=example")),
    ]));

    match login.execute(&TurnContext::new()) {
        ChainResult::Authenticated { identity, .. } => {
            assert_eq!(
                identity.map(|i| i.id().to_string()).as_deref(),
                Some("cn=guest,o=example")
            );
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn and_chain_stops_at_deny() {
    let mut login = chain(bag(&[
        ("MODE", json!("AND")),
        ("Class_0", json!("Allow")),
        ("Class_1", json!("Deny")),
    ]));

    assert!(matches!(
        login.execute(&TurnContext::new()),
        ChainResult::NotAuthenticated
    ));
}

#[test]
fn secret_chain_pauses_and_resumes() {
    let mut login = chain(bag(&[
        ("MODE", json!("AND")),
        ("Class_0", json!("SecretClass")),
        ("Class_0_Secret", json!("s3cret")),
        ("Class_0_Page", json!("token-entry")),
    ]));

    // First round trip: nothing submitted yet, the chain pauses on a page.
    match login.execute(&TurnContext::new()) {
        ChainResult::AwaitingInteraction(page) => assert_eq!(page.name(), "token-entry"),
        other => panic!("unexpected outcome: {other:?}"),
    }

    // Second round trip: the submission arrives and the chain completes.
    let resume = TurnContext::new()
        .with_param("secret", "s3cret")
        .with_param("user", "alice");
    match login.execute(&resume) {
        ChainResult::Authenticated { identity, credentials } => {
            assert_eq!(identity.map(|i| i.id().to_string()).as_deref(), Some("alice"));
            assert_eq!(
                credentials.map(|c| c.expose_secret().to_string()).as_deref(),
                Some("s3cret")
            );
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn wrong_secret_fails_the_attempt() {
    let mut login = chain(bag(&[
        ("Class_0", json!("SecretClass")),
        ("Class_0_Secret", json!("s3cret")),
    ]));

    assert!(matches!(
        login.execute(&TurnContext::new()),
        ChainResult::AwaitingInteraction(_)
    ));
    let resume = TurnContext::new().with_param("secret", "wrong-guess");
    assert!(matches!(login.execute(&resume), ChainResult::NotAuthenticated));
}

#[test]
fn earlier_step_principal_carries_into_the_secret_step() {
    // The allow step establishes the principal; the secret step is built
    // afterwards and picks it up from the merged `Principal` property when
    // the submission names no user of its own.
    let mut login = chain(bag(&[
        ("MODE", json!("AND")),
        ("Class_0", json!("Allow")),
        ("Class_0_AnonymousUser", json!("cn=alice,o=example")),
        ("Class_1", json!("SecretClass")),
        ("Class_1_Secret", json!("s3cret")),
    ]));

    assert!(matches!(
        login.execute(&TurnContext::new()),
        ChainResult::AwaitingInteraction(_)
    ));
    let resume = TurnContext::new().with_param("secret", "s3cret");
    match login.execute(&resume) {
        ChainResult::Authenticated { identity, .. } => {
            assert_eq!(
                identity.map(|i| i.id().to_string()).as_deref(),
                Some("cn=alice,o=example")
            );
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn invalid_declaration_is_dropped_and_the_rest_runs() {
    let mut login = chain(bag(&[
        ("Class_0", json!("com.example.NoSuchStep")),
        ("Class_1", json!("Allow")),
        ("Class_1_AnonymousUser", json!("cn=guest,o=example")),
    ]));

    assert_eq!(login.config().steps().len(), 1);
    assert!(matches!(
        login.execute(&TurnContext::new()),
        ChainResult::Authenticated { .. }
    ));
}

#[test]
fn nested_chain_runs_as_a_single_step() {
    // The inner chain (declared entirely through scoped properties) tries
    // Deny and fails; the outer OR chain falls through to Allow.
    let mut login = chain(bag(&[
        ("MODE", json!("OR")),
        ("Class_0", json!("ChainedAuth")),
        ("Class_0_MODE", json!("AND")),
        ("Class_0_Class_0", json!("Deny")),
        ("Class_1", json!("Allow")),
        ("Class_1_AnonymousUser", json!("cn=fallback,o=example")),
    ]));

    match login.execute(&TurnContext::new()) {
        ChainResult::Authenticated { identity, .. } => {
            assert_eq!(
                identity.map(|i| i.id().to_string()).as_deref(),
                Some("cn=fallback,o=example")
            );
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn nested_chain_can_pause_and_resume() {
    // A pausing step inside a nested chain suspends the outer chain too,
    // and the outer resume reaches the same inner instance.
    let mut login = chain(bag(&[
        ("MODE", json!("AND")),
        ("Class_0", json!("ChainedAuth")),
        ("Class_0_Class_0", json!("SecretClass")),
        ("Class_0_Class_0_Secret", json!("s3cret")),
        ("Class_0_Class_0_Page", json!("inner-login")),
    ]));

    match login.execute(&TurnContext::new()) {
        ChainResult::AwaitingInteraction(page) => assert_eq!(page.name(), "inner-login"),
        other => panic!("unexpected outcome: {other:?}"),
    }
    let resume = TurnContext::new()
        .with_param("secret", "s3cret")
        .with_param("user", "bob");
    match login.execute(&resume) {
        ChainResult::Authenticated { .. } => {
            assert_eq!(login.identity().map(|i| i.id()), Some("bob"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}
