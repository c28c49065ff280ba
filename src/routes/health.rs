//! Liveness endpoint
//!
//! `/health` returns 200 whenever the process is serving requests, with the
//! build and storage details an operator needs to tell instances apart.

use serde::Serialize;

use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub status: &'static str,
    pub version: &'static str,
    #[serde(rename = "gitCommit")]
    pub git_commit: &'static str,
    #[serde(rename = "buildTimestamp")]
    pub build_timestamp: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    pub timestamp: String,
    /// dev or production
    pub mode: &'static str,
    pub node_id: String,
    /// Backend holding records: mongodb or memory
    pub storage: &'static str,
}

pub fn health_response(state: &AppState) -> HealthResponse {
    HealthResponse {
        healthy: true,
        status: "online",
        version: env!("CARGO_PKG_VERSION"),
        git_commit: env!("GIT_COMMIT_SHORT"),
        build_timestamp: env!("BUILD_TIMESTAMP"),
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode { "dev" } else { "production" },
        node_id: state.args.node_id.to_string(),
        storage: state.storage,
    }
}
