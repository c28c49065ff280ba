//! On-behalf authorization gate
//!
//! Guest callers of the HDB API present a delegation code in the
//! `HDB-AuthorizationCode` header. The gate resolves it to a backend user and
//! hands back a session acting as that user. Callers that are already
//! authenticated pass straight through.
//!
//! Every guest-reachable operation takes an [`AuthorizedSession`], and the
//! only way to obtain one is [`authorize`].

use std::ops::Deref;

use tracing::debug;

use crate::auth::on_behalf::OnBehalfResolver;
use crate::auth::session::Session;

/// Header carrying the delegation code
pub const AUTHORIZATION_CODE_HEADER: &str = "HDB-AuthorizationCode";

/// Reasons the gate refuses a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// Guest caller with no delegation code anywhere
    #[error("HDB-AuthorizationCode is required in HTTP Header!")]
    MissingCredential,

    /// Delegation code the resolver does not know
    #[error("Authorization Code is incorrect!")]
    InvalidCredential,
}

/// A session that has passed the gate
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizedSession(Session);

impl AuthorizedSession {
    pub fn into_inner(self) -> Session {
        self.0
    }
}

impl Deref for AuthorizedSession {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.0
    }
}

/// Run the gate for one request.
///
/// `supplied_code` wins over the header; `header_lookup` is only invoked for
/// guest sessions without a supplied code. Request parameters are carried
/// into the returned session unchanged.
pub async fn authorize<R, F>(
    session: Session,
    supplied_code: Option<&str>,
    header_lookup: F,
    resolver: &R,
) -> Result<AuthorizedSession, GateError>
where
    R: OnBehalfResolver + ?Sized,
    F: FnOnce() -> Option<String>,
{
    if !session.is_guest() {
        return Ok(AuthorizedSession(session));
    }

    let code = match supplied_code.filter(|c| !c.is_empty()) {
        Some(code) => code.to_string(),
        None => header_lookup()
            .filter(|c| !c.is_empty())
            .ok_or(GateError::MissingCredential)?,
    };
    debug!("HDB-AuthorizationCode as {}", code);

    let user = resolver
        .get_on_behalf(&code)
        .await
        .ok_or(GateError::InvalidCredential)?;

    debug!(user = %user, "Guest request acting on behalf of user");
    Ok(AuthorizedSession(session.acting_as(user)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::on_behalf::MemorySettings;
    use crate::auth::session::RequestParams;
    use serde_json::json;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Resolver that counts how often it is consulted
    struct CountingResolver {
        inner: MemorySettings,
        calls: AtomicUsize,
    }

    impl CountingResolver {
        fn new(pairs: &[(&str, &str)]) -> Self {
            let inner = MemorySettings::new(None);
            for (code, user) in pairs {
                inner.insert(*code, *user);
            }
            Self {
                inner,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl OnBehalfResolver for CountingResolver {
        async fn get_on_behalf(&self, code: &str) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_on_behalf(code).await
        }
    }

    fn params() -> RequestParams {
        let mut p = RequestParams::new();
        p.insert("user".into(), json!("carol"));
        p.insert("sn".into(), json!("SN-42"));
        p
    }

    #[tokio::test]
    async fn test_authenticated_session_never_consults_resolver() {
        let resolver = CountingResolver::new(&[("CODE123", "bob")]);
        let header_read = Cell::new(false);

        for supplied in [None, Some("CODE123"), Some("bogus")] {
            let session = Session::for_user("existingUser", params());
            let authorized = authorize(
                session,
                supplied,
                || {
                    header_read.set(true);
                    Some("CODE123".to_string())
                },
                &resolver,
            )
            .await
            .unwrap();

            assert_eq!(authorized.current_user(), "existingUser");
            assert_eq!(authorized.params(), &params());
        }

        assert_eq!(resolver.calls(), 0);
        assert!(!header_read.get());
    }

    #[tokio::test]
    async fn test_guest_without_code_is_missing_credential() {
        let resolver = CountingResolver::new(&[("CODE123", "bob")]);
        let result = authorize(Session::guest(params()), None, || None, &resolver).await;

        assert_eq!(result.unwrap_err(), GateError::MissingCredential);
        assert_eq!(resolver.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_codes_count_as_missing() {
        let resolver = CountingResolver::new(&[]);
        let result = authorize(
            Session::guest(params()),
            Some(""),
            || Some(String::new()),
            &resolver,
        )
        .await;

        assert_eq!(result.unwrap_err(), GateError::MissingCredential);
    }

    #[tokio::test]
    async fn test_unknown_code_is_invalid_credential() {
        let resolver = CountingResolver::new(&[("CODE123", "bob")]);
        let result = authorize(
            Session::guest(params()),
            None,
            || Some("NOPE".to_string()),
            &resolver,
        )
        .await;

        assert_eq!(result.unwrap_err(), GateError::InvalidCredential);
        assert_eq!(resolver.calls(), 1);
    }

    #[tokio::test]
    async fn test_header_code_switches_identity() {
        let resolver = CountingResolver::new(&[("CODE123", "bob")]);
        let authorized = authorize(
            Session::guest(params()),
            None,
            || Some("CODE123".to_string()),
            &resolver,
        )
        .await
        .unwrap();

        assert_eq!(authorized.current_user(), "bob");
        assert!(!authorized.is_guest());
        assert_eq!(authorized.params(), &params());
    }

    #[tokio::test]
    async fn test_supplied_code_wins_over_header() {
        let resolver = CountingResolver::new(&[("SITE", "alice"), ("HEADER", "bob")]);
        let header_read = Cell::new(false);

        let authorized = authorize(
            Session::guest(params()),
            Some("SITE"),
            || {
                header_read.set(true);
                Some("HEADER".to_string())
            },
            &resolver,
        )
        .await
        .unwrap();

        assert_eq!(authorized.current_user(), "alice");
        assert!(!header_read.get());
    }

    #[test]
    fn test_gate_blocking_call() {
        let resolver = MemorySettings::new(None);
        resolver.insert("CODE123", "bob");

        let authorized = tokio_test::block_on(authorize(
            Session::guest(RequestParams::new()),
            None,
            || Some("CODE123".to_string()),
            &resolver,
        ))
        .unwrap();

        assert_eq!(authorized.into_inner().current_user(), "bob");
    }
}
