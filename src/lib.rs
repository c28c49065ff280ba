//! HDB gateway - device and directory API for HDB applications
//!
//! Serves the `iot.hdb_api.*` operations used by HDB (historical database)
//! applications and IoT gateways: company and group directory lookups,
//! device registration and updates, device errors and events.
//!
//! Unauthenticated callers act on behalf of a backend user by presenting a
//! delegation code in the `HDB-AuthorizationCode` header. See [`auth::gate`].
//!
//! ## Layers
//!
//! - **auth**: sessions, the on-behalf gate, delegation settings, JWT login tokens
//! - **db**: MongoDB client and document schemas
//! - **store**: record storage traits with MongoDB and in-memory backends
//! - **services**: operation logic
//! - **routes** / **server**: hyper HTTP surface

pub mod auth;
pub mod config;
pub mod db;
pub mod routes;
pub mod server;
pub mod services;
pub mod store;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{HdbError, Result};
