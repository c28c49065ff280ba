//! `iot.hdb_api.*` operation dispatch
//!
//! Every operation except `ping` runs the on-behalf gate first. The result
//! is returned as a JSON value which the server wraps as `{"message": ...}`.

use hyper::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::auth::{authorize, AuthorizedSession, Session, AUTHORIZATION_CODE_HEADER};
use crate::routes::ApiRequest;
use crate::server::AppState;
use crate::services::access::READ;
use crate::types::{HdbError, Result};

/// Path prefix of every HDB API operation
pub const METHOD_PREFIX: &str = "/api/method/iot.hdb_api.";

/// Reply to a plain `ping`
pub const PONG: &str = "pong from iot.hdb_api.ping";

/// Operations served under [`METHOD_PREFIX`]
pub const OPERATIONS: &[&str] = &[
    "list_companies",
    "list_company_groups",
    "list_user_groups",
    "list_roles",
    "list_role_permissions",
    "login",
    "list_devices",
    "access_device",
    "get_device",
    "get_device_db",
    "is_beta_enable",
    "add_device",
    "batch_add_device",
    "update_device",
    "update_device_owner",
    "update_device_hdb",
    "update_device_status",
    "update_device_name",
    "update_device_position",
    "add_device_error",
    "add_device_event",
    "get_license_data",
    "get_time",
    "ping",
];

fn to_json<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| HdbError::Internal(format!("Failed to encode response: {}", e)))
}

/// Parameter the operation cannot run without
fn required_param<'a>(session: &'a AuthorizedSession, key: &str) -> Result<&'a str> {
    session
        .param_str(key)
        .ok_or_else(|| HdbError::missing_fields(&[key]))
}

/// Run operation `op` for one request
pub async fn dispatch(
    state: &AppState,
    op: &str,
    session: Session,
    req: &ApiRequest,
) -> Result<Value> {
    if !OPERATIONS.contains(&op) {
        return Err(HdbError::NotFound(format!("Unknown method iot.hdb_api.{}", op)));
    }
    if op == "ping" {
        return Ok(Value::String(ping(&session, req)));
    }

    // is_beta_enable is called by devices holding the site code
    let supplied = if op == "is_beta_enable" && session.is_guest() {
        state.settings.authorization_code().await
    } else {
        None
    };
    let s = authorize(
        session,
        supplied.as_deref(),
        || req.header(AUTHORIZATION_CODE_HEADER),
        state.settings.as_ref(),
    )
    .await?;
    debug!(op = %op, user = %s.current_user(), "HDB API call");

    let directory = &state.directory;
    let devices = &state.devices;
    match op {
        "list_companies" => to_json(directory.list_companies(&s).await?),
        "list_company_groups" => {
            let comp = required_param(&s, "comp")?;
            to_json(directory.list_company_groups(&s, comp).await?)
        }
        "list_user_groups" => {
            let user = required_param(&s, "user")?;
            to_json(directory.list_user_groups(&s, user).await?)
        }
        "list_roles" => to_json(directory.list_roles(&s).await?),
        "list_role_permissions" => {
            let role = required_param(&s, "role")?;
            to_json(directory.list_role_permissions(&s, role).await?)
        }
        "login" => {
            let resp = directory
                .login(&s, s.param_str("user"), s.param_str("passwd"))
                .await?;
            info!(user = %resp.user, "HDB application login");
            to_json(resp)
        }
        "list_devices" => to_json(devices.list_devices(&s, None).await?),
        "access_device" => {
            let sn = required_param(&s, "sn")?;
            let op = s.param_str("op").unwrap_or(READ);
            to_json(devices.access_device(&s, sn, op).await?)
        }
        "get_device" => to_json(devices.get_device(&s, None).await?),
        "get_device_db" => to_json(devices.get_device_db(&s, None).await?),
        "is_beta_enable" => {
            let sn = required_param(&s, "sn")?;
            to_json(devices.is_beta_enable(&s, sn).await?)
        }
        "get_license_data" => to_json(devices.get_license_data(&s, s.param_str("sn")).await?),
        "get_time" => to_json(devices.get_time(&s)),
        "add_device" => to_json(devices.add_device(&s, &req.post_json()?).await?),
        "batch_add_device" => to_json(devices.batch_add_device(&s, &req.post_json()?).await?),
        "update_device" => to_json(devices.update_device(&s, &req.post_json()?).await?),
        "update_device_owner" => {
            to_json(devices.update_device_owner(&s, &req.post_json()?).await?)
        }
        "update_device_hdb" => to_json(devices.update_device_hdb(&s, &req.post_json()?).await?),
        "update_device_status" => {
            to_json(devices.update_device_status(&s, &req.post_json()?).await?)
        }
        "update_device_name" => to_json(devices.update_device_name(&s, &req.post_json()?).await?),
        "update_device_position" => {
            to_json(devices.update_device_position(&s, &req.post_json()?).await?)
        }
        "add_device_error" => devices.add_device_error(&s, &req.post_json()?).await,
        "add_device_event" => devices.add_device_event(&s, &req.post_json()?).await,
        _ => Err(HdbError::NotFound(format!("Unknown method iot.hdb_api.{}", op))),
    }
}

/// Liveness check for HDB applications; no delegation code needed
fn ping(session: &Session, req: &ApiRequest) -> String {
    if req.method != Method::POST {
        return PONG.to_string();
    }
    match session.params().get("text") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Null) | Some(Value::String(_)) | None => "No Text".to_string(),
        Some(other) => other.to_string(),
    }
}
