//! HDB settings: delegation codes and the site authorization code

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

pub const ON_BEHALF_COLLECTION: &str = "hdb_on_behalf";
pub const HDB_SETTINGS_COLLECTION: &str = "hdb_settings";

fn default_true() -> bool {
    true
}

/// Delegation code granting guest callers the identity of `user`
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct OnBehalfDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub code: String,

    pub user: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime>,
}

impl OnBehalfDoc {
    pub fn new(code: String, user: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            code,
            user,
            enabled: true,
            expires_at: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires_at| expires_at < DateTime::now())
            .unwrap_or(false)
    }
}

impl IntoIndexes for OnBehalfDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        // Not unique: replaced grants stay behind as soft-deleted rows
        vec![(
            doc! { "code": 1 },
            Some(
                IndexOptions::builder()
                    .name("on_behalf_code_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for OnBehalfDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Single-document site settings
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct HdbSettingsDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default)]
    pub authorization_code: Option<String>,
}

impl IntoIndexes for HdbSettingsDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        Vec::new()
    }
}

impl MutMetadata for HdbSettingsDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry() {
        let mut entry = OnBehalfDoc::new("CODE".into(), "bob".into());
        assert!(!entry.is_expired());

        entry.expires_at = Some(DateTime::from_millis(0));
        assert!(entry.is_expired());

        entry.expires_at = Some(DateTime::from_millis(i64::MAX / 2));
        assert!(!entry.is_expired());
    }
}
