//! Services layer for the HDB gateway
//!
//! Business logic behind the `iot.hdb_api.*` operations. Every operation
//! that a guest can reach takes an [`AuthorizedSession`](crate::auth::AuthorizedSession),
//! so it can only run after the gate.
//!
//! ## Services
//!
//! - **Directory**: companies, groups, roles and login
//! - **Devices**: device listing, lookup, registration and updates
//! - **Access**: per-device permission checks
//! - **DeviceLog**: device error reports and events

pub mod access;
pub mod device_log;
pub mod devices;
pub mod directory;

pub use access::has_permission;
pub use devices::{BatchAddResult, DeviceInfo, DeviceList, DeviceService, GroupDevices};
pub use directory::{CompanyGroupInfo, CompanyInfo, DirectoryService, LoginResponse};

use serde_json::{Map, Value};

use crate::types::{HdbError, Result};

/// JSON object posted to a write operation
pub type Payload = Map<String, Value>;

/// Non-empty string field
pub(crate) fn field_str<'a>(data: &'a Payload, key: &str) -> Option<&'a str> {
    data.get(key)
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
}

/// Field rendered as text; non-string JSON values keep their JSON form
pub(crate) fn field_text(data: &Payload, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Integer field; absent, null, empty or false count as 0
pub(crate) fn field_int(data: &Payload, key: &str) -> Result<i64> {
    let invalid = |v: &Value| HdbError::BadRequest(format!("Invalid integer for {}: {}", key, v));
    match data.get(key) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(0),
        Some(Value::Bool(true)) => Ok(1),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| invalid(&Value::Number(n.clone()))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(0),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(&Value::String(s.clone()))),
        Some(other) => Err(invalid(other)),
    }
}

/// Serialize a stored record for a response, swapping storage bookkeeping
/// for `creation` and `modified`
pub(crate) fn record_json<T: serde::Serialize>(
    record: &T,
    metadata: &crate::db::schemas::Metadata,
) -> Result<Value> {
    let mut value = serde_json::to_value(record)?;
    if let Value::Object(map) = &mut value {
        map.remove("_id");
        map.remove("metadata");
        map.insert("creation".into(), metadata.creation().into());
        map.insert("modified".into(), metadata.modified().into());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_field_int_coercion() {
        let data = payload(json!({
            "a": 3, "b": "7", "c": "", "d": null, "e": 2.9, "f": true, "g": "x"
        }));
        assert_eq!(field_int(&data, "a").unwrap(), 3);
        assert_eq!(field_int(&data, "b").unwrap(), 7);
        assert_eq!(field_int(&data, "c").unwrap(), 0);
        assert_eq!(field_int(&data, "d").unwrap(), 0);
        assert_eq!(field_int(&data, "e").unwrap(), 2);
        assert_eq!(field_int(&data, "f").unwrap(), 1);
        assert_eq!(field_int(&data, "missing").unwrap(), 0);
        assert!(field_int(&data, "g").is_err());
    }

    #[test]
    fn test_field_text() {
        let data = payload(json!({"s": "hi", "o": {"k": 1}, "n": null}));
        assert_eq!(field_text(&data, "s").as_deref(), Some("hi"));
        assert_eq!(field_text(&data, "o").as_deref(), Some(r#"{"k":1}"#));
        assert_eq!(field_text(&data, "n"), None);
        assert_eq!(field_str(&payload(json!({"s": ""})), "s"), None);
    }
}
