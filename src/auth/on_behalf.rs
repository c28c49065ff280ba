//! HDB settings: delegation code resolution and the site authorization code
//!
//! The gate only sees the [`OnBehalfResolver`] trait. Storage lives behind it:
//! an in-memory table for dev mode and tests, or MongoDB collections in
//! production.

use bson::doc;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::db::schemas::{
    HdbSettingsDoc, OnBehalfDoc, HDB_SETTINGS_COLLECTION, ON_BEHALF_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection};
use crate::types::HdbError;

/// Maps a delegation code to the user it acts for
///
/// Yields exactly a username or nothing; lookup failures are reported as
/// nothing.
#[async_trait::async_trait]
pub trait OnBehalfResolver: Send + Sync {
    async fn get_on_behalf(&self, code: &str) -> Option<String>;
}

/// Settings component of the HDB API
#[async_trait::async_trait]
pub trait HdbSettings: OnBehalfResolver {
    /// Site-wide authorization code used by device-side checks
    async fn authorization_code(&self) -> Option<String>;
}

// =============================================================================
// In-memory settings
// =============================================================================

/// Delegation table held in memory
#[derive(Debug, Default)]
pub struct MemorySettings {
    codes: DashMap<String, String>,
    authorization_code: Option<String>,
}

impl MemorySettings {
    pub fn new(authorization_code: Option<String>) -> Self {
        Self {
            codes: DashMap::new(),
            authorization_code: authorization_code.filter(|c| !c.is_empty()),
        }
    }

    /// Build from `code=user` pairs, skipping malformed entries
    pub fn from_pairs<'a>(
        authorization_code: Option<String>,
        pairs: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let settings = Self::new(authorization_code);
        for pair in pairs {
            match pair.split_once('=') {
                Some((code, user)) if !code.trim().is_empty() && !user.trim().is_empty() => {
                    settings.insert(code.trim(), user.trim());
                }
                _ => warn!("Ignoring malformed delegation entry '{}'", pair),
            }
        }
        settings
    }

    pub fn insert(&self, code: impl Into<String>, user: impl Into<String>) {
        self.codes.insert(code.into(), user.into());
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

#[async_trait::async_trait]
impl OnBehalfResolver for MemorySettings {
    async fn get_on_behalf(&self, code: &str) -> Option<String> {
        self.codes.get(code).map(|user| user.value().clone())
    }
}

#[async_trait::async_trait]
impl HdbSettings for MemorySettings {
    async fn authorization_code(&self) -> Option<String> {
        self.authorization_code.clone()
    }
}

// =============================================================================
// MongoDB settings
// =============================================================================

/// Delegation table and site settings stored in MongoDB
pub struct MongoSettings {
    on_behalf: MongoCollection<OnBehalfDoc>,
    settings: MongoCollection<HdbSettingsDoc>,
    fallback_code: Option<String>,
}

impl MongoSettings {
    /// `fallback_code` is used when the settings document carries no code
    pub async fn new(mongo: &MongoClient, fallback_code: Option<String>) -> Result<Self, HdbError> {
        let on_behalf = mongo.collection::<OnBehalfDoc>(ON_BEHALF_COLLECTION).await?;
        let settings = mongo
            .collection::<HdbSettingsDoc>(HDB_SETTINGS_COLLECTION)
            .await?;
        info!("HDB settings backed by MongoDB");

        Ok(Self {
            on_behalf,
            settings,
            fallback_code: fallback_code.filter(|c| !c.is_empty()),
        })
    }

    /// Store a delegation code, replacing any previous entry for it
    pub async fn grant(&self, code: &str, user: &str) -> Result<(), HdbError> {
        let replaced = self.on_behalf.soft_delete(doc! { "code": code }).await?;
        if replaced > 0 {
            debug!("Replaced {} earlier grant(s) for a delegation code", replaced);
        }
        self.on_behalf
            .insert_one(OnBehalfDoc::new(code.to_string(), user.to_string()))
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl OnBehalfResolver for MongoSettings {
    async fn get_on_behalf(&self, code: &str) -> Option<String> {
        match self
            .on_behalf
            .find_one(doc! { "code": code, "enabled": true })
            .await
        {
            Ok(Some(entry)) if !entry.is_expired() => Some(entry.user),
            Ok(_) => None,
            Err(e) => {
                warn!("Delegation code lookup failed: {}", e);
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl HdbSettings for MongoSettings {
    async fn authorization_code(&self) -> Option<String> {
        let stored = match self.settings.find_one(doc! {}).await {
            Ok(doc) => doc.and_then(|s| s.authorization_code),
            Err(e) => {
                warn!("HDB settings lookup failed: {}", e);
                None
            }
        };
        stored
            .filter(|c| !c.is_empty())
            .or_else(|| self.fallback_code.clone())
    }
}
