//! Device records
//!
//! A device is keyed by its serial number and owned either by a single user
//! or by a company group.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

pub const DEVICE_COLLECTION: &str = "iot_devices";
pub const DEVICE_PARENT_COLLECTION: &str = "iot_device_parents";

/// Kind of owner a device can have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OwnerType {
    #[serde(rename = "User")]
    User,
    #[serde(rename = "Cloud Company Group")]
    CompanyGroup,
}

impl OwnerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerType::User => "User",
            OwnerType::CompanyGroup => "Cloud Company Group",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "User" => Some(OwnerType::User),
            "Cloud Company Group" => Some(OwnerType::CompanyGroup),
            _ => None,
        }
    }
}

impl fmt::Display for OwnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device document
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct DeviceDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Serial number
    pub sn: String,

    #[serde(default)]
    pub dev_name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Company following the owner (group's company for group owners)
    #[serde(default)]
    pub company: Option<String>,

    #[serde(default)]
    pub owner_type: Option<OwnerType>,

    #[serde(default)]
    pub owner_id: Option<String>,

    /// Time-series database path, relative to the company domain
    #[serde(default)]
    pub hdb: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub longitude: Option<f64>,

    #[serde(default)]
    pub latitude: Option<f64>,

    /// 1 when the device runs beta applications
    #[serde(default)]
    pub use_beta: i64,
}

impl DeviceDoc {
    /// New unowned device; `dev_name` falls back to the serial number
    pub fn new(sn: String, dev_name: Option<String>) -> Self {
        let dev_name = dev_name.filter(|n| !n.is_empty()).unwrap_or_else(|| sn.clone());
        Self {
            _id: None,
            metadata: Metadata::new(),
            sn,
            dev_name,
            ..Default::default()
        }
    }

    pub fn is_owned_by(&self, owner_type: OwnerType, owner_id: &str) -> bool {
        self.owner_type == Some(owner_type) && self.owner_id.as_deref() == Some(owner_id)
    }
}

impl IntoIndexes for DeviceDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "sn": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("sn_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "owner_type": 1, "owner_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("owner_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for DeviceDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Child device -> gateway device it reports through
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct DeviceParentDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub sn: String,

    pub parent: String,
}

impl IntoIndexes for DeviceParentDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "sn": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("child_sn_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for DeviceParentDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
