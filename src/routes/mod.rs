//! HTTP route handlers
//!
//! - `/health` - liveness
//! - `/api/method/iot.hdb_api.<operation>` - HDB API operations

pub mod hdb_api;
pub mod health;
pub mod request;

pub use hdb_api::{dispatch, METHOD_PREFIX, OPERATIONS, PONG};
pub use health::{health_response, HealthResponse};
pub use request::{parse_params, ApiRequest};
