//! Configuration for the HDB gateway
//!
//! CLI arguments and environment variable handling using clap.

use chrono::FixedOffset;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use uuid::Uuid;

/// HDB gateway - device and directory API for HDB applications
#[derive(Parser, Debug, Clone)]
#[command(name = "hdb-gateway")]
#[command(about = "HDB API gateway with on-behalf authorization for IoT devices")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (memory stores when MongoDB is down, dev JWT secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "hdb")]
    pub mongodb_db: String,

    /// JWT secret for login tokens (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "3600")]
    pub jwt_expiry_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (plain, json)
    #[arg(long, env = "LOG_FORMAT", default_value = "plain")]
    pub log_format: String,

    /// Offset of local time from UTC in minutes, used for device event times
    #[arg(long, env = "UTC_OFFSET_MINUTES", default_value = "0", allow_hyphen_values = true)]
    pub utc_offset_minutes: i32,

    /// Site-wide authorization code, used when the settings store has none
    #[arg(long, env = "HDB_AUTHORIZATION_CODE")]
    pub authorization_code: Option<String>,

    /// Delegation codes to grant at startup, as `code=user` pairs
    #[arg(long = "on-behalf", env = "HDB_ON_BEHALF", value_delimiter = ',')]
    pub on_behalf: Vec<String>,

    /// JSON file seeding the memory store in dev mode
    #[arg(long, env = "SEED_FILE")]
    pub seed_file: Option<PathBuf>,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        if self.local_offset().is_none() {
            return Err(format!(
                "UTC_OFFSET_MINUTES out of range: {}",
                self.utc_offset_minutes
            ));
        }

        if !matches!(self.log_format.as_str(), "plain" | "json") {
            return Err(format!("Unknown LOG_FORMAT: {}", self.log_format));
        }

        if let Some(bad) = self.on_behalf.iter().find(|p| !is_code_pair(p)) {
            return Err(format!("HDB_ON_BEHALF entry must be code=user: {}", bad));
        }

        Ok(())
    }

    /// Local time zone for device timestamps
    pub fn local_offset(&self) -> Option<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
    }

    /// Delegation codes from `--on-behalf`
    pub fn on_behalf_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.on_behalf.iter().filter_map(|p| split_code_pair(p))
    }
}

fn split_code_pair(pair: &str) -> Option<(&str, &str)> {
    let (code, user) = pair.split_once('=')?;
    let (code, user) = (code.trim(), user.trim());
    (!code.is_empty() && !user.is_empty()).then_some((code, user))
}

fn is_code_pair(pair: &str) -> bool {
    split_code_pair(pair).is_some()
}
