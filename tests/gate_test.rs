//! Integration tests for the on-behalf authorization gate
//!
//! Drives `authorize` through the public API with an in-memory delegation
//! table.

use hdb_gateway::auth::{authorize, GateError, MemorySettings, OnBehalfResolver, RequestParams, Session};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Resolver that records every lookup
struct Recorder {
    settings: MemorySettings,
    lookups: AtomicUsize,
}

impl Recorder {
    fn with(code: &str, user: &str) -> Self {
        let settings = MemorySettings::new(None);
        settings.insert(code, user);
        Self {
            settings,
            lookups: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl OnBehalfResolver for Recorder {
    async fn get_on_behalf(&self, code: &str) -> Option<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.settings.get_on_behalf(code).await
    }
}

fn params() -> RequestParams {
    let mut p = RequestParams::new();
    p.insert("sn".into(), json!("SN-001"));
    p.insert("cmd".into(), json!({"op": "read", "n": 2}));
    p
}

#[tokio::test]
async fn test_guest_with_header_code_acts_as_resolved_user() {
    let resolver = Recorder::with("CODE123", "bob");
    let before = params();

    let session = authorize(
        Session::guest(before.clone()),
        None,
        || Some("CODE123".to_string()),
        &resolver,
    )
    .await
    .unwrap();

    assert_eq!(session.current_user(), "bob");
    assert!(!session.is_guest());
    assert_eq!(session.params(), &before);
}

#[tokio::test]
async fn test_guest_without_any_code_is_missing_credential() {
    let resolver = Recorder::with("CODE123", "bob");

    let err = authorize(Session::guest(params()), None, || None, &resolver)
        .await
        .unwrap_err();

    assert_eq!(err, GateError::MissingCredential);
    assert_eq!(err.to_string(), "HDB-AuthorizationCode is required in HTTP Header!");
    assert_eq!(resolver.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_guest_with_unknown_code_is_invalid_credential() {
    let resolver = Recorder::with("CODE123", "bob");

    let err = authorize(
        Session::guest(params()),
        Some("NOPE"),
        || Some("CODE123".to_string()),
        &resolver,
    )
    .await
    .unwrap_err();

    assert_eq!(err, GateError::InvalidCredential);
    assert_eq!(err.to_string(), "Authorization Code is incorrect!");
}

#[tokio::test]
async fn test_supplied_code_resolves_to_alice() {
    let resolver = Recorder::with("SITE", "alice");

    let session = authorize(Session::guest(params()), Some("SITE"), || None, &resolver)
        .await
        .unwrap();

    assert_eq!(session.current_user(), "alice");
}

#[tokio::test]
async fn test_authenticated_session_is_untouched() {
    let resolver = Recorder::with("CODE123", "bob");
    let before = params();

    for code in [None, Some("CODE123"), Some("garbage")] {
        let session = authorize(
            Session::for_user("existingUser", before.clone()),
            code,
            || panic!("header must not be read for authenticated sessions"),
            &resolver,
        )
        .await
        .unwrap();

        assert_eq!(session.current_user(), "existingUser");
        assert_eq!(session.params(), &before);
    }
    assert_eq!(resolver.lookups.load(Ordering::SeqCst), 0);
}
