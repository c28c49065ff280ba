//! Device error reports and device events

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::{Metadata, OwnerType};

pub const DEVICE_ERROR_COLLECTION: &str = "iot_device_errors";
pub const DEVICE_EVENT_COLLECTION: &str = "iot_device_events";

fn device_index(index_name: &str) -> Vec<(Document, Option<IndexOptions>)> {
    vec![
        (
            doc! { "name": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name(format!("{}_name_unique", index_name))
                    .build(),
            ),
        ),
        (
            doc! { "device": 1 },
            Some(
                IndexOptions::builder()
                    .name(format!("{}_device_index", index_name))
                    .build(),
            ),
        ),
    ]
}

/// Error reported by a device
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct DeviceErrorDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Record identifier
    pub name: String,

    /// Serial number of the reporting device
    pub device: String,

    #[serde(default)]
    pub error_type: Option<String>,

    #[serde(default)]
    pub error_key: Option<String>,

    #[serde(default)]
    pub error_level: i64,

    #[serde(default)]
    pub error_info: Option<String>,

    #[serde(default)]
    pub wechat_notify: i64,
}

impl IntoIndexes for DeviceErrorDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        device_index("device_error")
    }
}

impl MutMetadata for DeviceErrorDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Event emitted by a device, stamped with the device's owner at the time
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct DeviceEventDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub name: String,

    pub device: String,

    #[serde(default)]
    pub event_level: i64,

    #[serde(default)]
    pub event_type: Option<String>,

    #[serde(default)]
    pub event_info: Option<String>,

    #[serde(default)]
    pub event_data: Option<String>,

    /// Local wall-clock time of the event
    pub event_time: String,

    #[serde(default)]
    pub event_device: Option<String>,

    #[serde(default)]
    pub event_source: Option<String>,

    #[serde(default)]
    pub owner_type: Option<OwnerType>,

    #[serde(default)]
    pub owner_id: Option<String>,

    #[serde(default)]
    pub owner_company: Option<String>,

    #[serde(default)]
    pub wechat_notify: i64,
}

impl IntoIndexes for DeviceEventDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        device_index("device_event")
    }
}

impl MutMetadata for DeviceEventDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
