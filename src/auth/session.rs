//! Per-request identity context
//!
//! A `Session` is built by the HTTP layer for every incoming request and
//! handed explicitly to the gate and then to the operation. Nothing here is
//! global or shared between requests.

use serde_json::{Map, Value};

/// Username of an unauthenticated caller
pub const GUEST: &str = "Guest";

/// Request parameters (query string and form fields)
pub type RequestParams = Map<String, Value>;

/// Identity and parameters of the current request
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    user: String,
    params: RequestParams,
}

impl Session {
    /// Session for a caller that presented no credentials
    pub fn guest(params: RequestParams) -> Self {
        Self {
            user: GUEST.to_string(),
            params,
        }
    }

    /// Session for a caller already authenticated as `user`
    pub fn for_user(user: impl Into<String>, params: RequestParams) -> Self {
        Self {
            user: user.into(),
            params,
        }
    }

    pub fn current_user(&self) -> &str {
        &self.user
    }

    pub fn is_guest(&self) -> bool {
        self.user == GUEST
    }

    pub fn params(&self) -> &RequestParams {
        &self.params
    }

    /// Non-empty string parameter
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Same request acting as `user`. Parameters move over untouched.
    pub(crate) fn acting_as(self, user: String) -> Self {
        Self {
            user,
            params: self.params,
        }
    }
}
