//! Common metadata for all HDB records
//!
//! Creation and modification timestamps double as the `creation` and
//! `modified` fields of API responses.

use bson::DateTime;
use serde::{Deserialize, Serialize};

/// Timestamp layout used in API responses
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Common metadata for all documents
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    #[serde(default)]
    pub is_deleted: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}

impl Metadata {
    /// Fresh metadata stamped with the current time
    pub fn new() -> Self {
        let now = DateTime::now();
        Self {
            is_deleted: false,
            deleted_at: None,
            updated_at: Some(now),
            created_at: Some(now),
        }
    }

    /// Mark as modified now
    pub fn touch(&mut self) {
        self.updated_at = Some(DateTime::now());
    }

    pub fn creation(&self) -> Option<String> {
        self.created_at.map(format_timestamp)
    }

    pub fn modified(&self) -> Option<String> {
        self.updated_at.map(format_timestamp)
    }
}

fn format_timestamp(ts: DateTime) -> String {
    ts.to_chrono().format(TIMESTAMP_FORMAT).to_string()
}
