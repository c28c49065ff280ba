//! Decoded API request handed to operation handlers

use bytes::Bytes;
use hyper::header::{HeaderMap, CONTENT_TYPE};
use hyper::Method;
use serde_json::{Map, Value};

use crate::auth::RequestParams;
use crate::services::Payload;
use crate::types::{HdbError, Result};

/// Transport side of one `iot.hdb_api.*` call. Identity and parameters
/// travel separately in a [`Session`](crate::auth::Session).
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiRequest {
    pub fn new(method: Method, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            headers,
            body,
        }
    }

    /// Header value as text; missing or non-UTF-8 values are `None`
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// JSON object posted as the request body
    pub fn post_json(&self) -> Result<Payload> {
        if self.method != Method::POST {
            return Err(HdbError::BadRequest("Request Method Must be POST!".into()));
        }
        let ctype = self.header(CONTENT_TYPE.as_str()).unwrap_or_default();
        if !ctype.to_lowercase().contains("json") {
            return Err(HdbError::BadRequest(format!(
                "Incorrect HTTP Content-Type found {}",
                ctype
            )));
        }
        if self.body.is_empty() {
            return Err(HdbError::BadRequest("JSON Data not found!".into()));
        }
        match serde_json::from_slice::<Value>(&self.body)? {
            Value::Object(map) => Ok(map),
            _ => Err(HdbError::BadRequest("JSON Data must be an object".into())),
        }
    }
}

/// Merge the query string with an urlencoded form body or the keys of a JSON
/// object body. Body fields win.
pub fn parse_params(query: Option<&str>, content_type: Option<&str>, body: &[u8]) -> RequestParams {
    let mut params = Map::new();
    if let Some(query) = query {
        extend_form(&mut params, query.as_bytes());
    }
    let ctype = content_type.unwrap_or_default().to_lowercase();
    if ctype.starts_with("application/x-www-form-urlencoded") {
        extend_form(&mut params, body);
    } else if ctype.contains("json") && !body.is_empty() {
        if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
            params.extend(map);
        }
    }
    params
}

fn extend_form(params: &mut RequestParams, raw: &[u8]) {
    if let Ok(pairs) = serde_urlencoded::from_bytes::<Vec<(String, String)>>(raw) {
        for (key, value) in pairs {
            params.insert(key, Value::String(value));
        }
    }
}
