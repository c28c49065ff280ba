//! HTTP server for the HDB gateway

pub mod http;

pub use http::{route, run, AppState};
