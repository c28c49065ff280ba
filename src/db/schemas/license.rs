//! Device license records

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

pub const LICENSE_COLLECTION: &str = "iot_licenses";

/// License issued to one device
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct LicenseDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Device serial number
    pub name: String,

    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub license_data: Option<String>,
}

impl IntoIndexes for LicenseDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "name": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("license_name_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for LicenseDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
