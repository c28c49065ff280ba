//! MongoDB client and collection wrapper
//!
//! Every HDB record carries a `metadata` block; reads skip soft-deleted
//! documents and writes keep the timestamps current.

use bson::{doc, oid::ObjectId, DateTime, Document};
use futures_util::TryStreamExt;
use mongodb::{options::IndexOptions, Client, Collection, Database, IndexModel};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use crate::db::schemas::Metadata;
use crate::types::HdbError;

/// Server selection and connect timeout, so startup can fall back quickly
const CONNECT_TIMEOUT_MS: u32 = 3000;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// Handle on the HDB database
#[derive(Clone)]
pub struct MongoClient {
    db: Database,
}

impl MongoClient {
    /// Connect and ping `db_name`
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, HdbError> {
        info!("Connecting to MongoDB at {}", uri);

        let client = Client::with_uri_str(with_timeouts(uri))
            .await
            .map_err(|e| HdbError::Database(format!("Failed to connect to MongoDB: {}", e)))?;
        let db = client.database(db_name);

        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| HdbError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);
        Ok(Self { db })
    }

    /// Typed collection with its schema indexes in place
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, HdbError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        let collection = MongoCollection {
            inner: self.db.collection::<T>(name),
        };
        collection.apply_indexes(name).await?;
        Ok(collection)
    }
}

/// Append the connect timeouts to a connection string
fn with_timeouts(uri: &str) -> String {
    let sep = if uri.contains('?') { '&' } else { '?' };
    format!(
        "{uri}{sep}serverSelectionTimeoutMS={ms}&connectTimeoutMS={ms}",
        ms = CONNECT_TIMEOUT_MS
    )
}

/// Restrict `filter` to documents that are not soft deleted
fn live(mut filter: Document) -> Document {
    filter.insert("metadata.is_deleted", doc! { "$ne": true });
    filter
}

/// Typed collection over live HDB records
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
{
    async fn apply_indexes(&self, name: &str) -> Result<(), HdbError> {
        let indexes: Vec<IndexModel> = T::into_indices()
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();
        if indexes.is_empty() {
            return Ok(());
        }

        let count = indexes.len();
        self.inner
            .create_indexes(indexes)
            .await
            .map_err(|e| HdbError::Database(format!("Failed to create indexes on {}: {}", name, e)))?;
        debug!("Ensured {} index(es) on {}", count, name);
        Ok(())
    }

    /// Insert a record with fresh timestamps
    pub async fn insert_one(&self, mut item: T) -> Result<ObjectId, HdbError> {
        let now = DateTime::now();
        let metadata = item.mut_metadata();
        metadata.is_deleted = false;
        metadata.created_at = Some(now);
        metadata.updated_at = Some(now);

        self.inner
            .insert_one(item)
            .await
            .map_err(|e| HdbError::Database(format!("Insert failed: {}", e)))?
            .inserted_id
            .as_object_id()
            .ok_or_else(|| HdbError::Database("Failed to get inserted ID".into()))
    }

    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, HdbError> {
        self.inner
            .find_one(live(filter))
            .await
            .map_err(|e| HdbError::Database(format!("Find failed: {}", e)))
    }

    /// Live records matching `filter`, ordered by `sort`
    pub async fn find_many(&self, filter: Document, sort: Document) -> Result<Vec<T>, HdbError> {
        self.inner
            .find(live(filter))
            .sort(sort)
            .await
            .map_err(|e| HdbError::Database(format!("Find failed: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| HdbError::Database(format!("Reading results failed: {}", e)))
    }

    /// Replace a live record; false when nothing matched
    pub async fn replace_one(&self, filter: Document, mut item: T) -> Result<bool, HdbError> {
        item.mut_metadata().updated_at = Some(DateTime::now());

        let result = self
            .inner
            .replace_one(live(filter), item)
            .await
            .map_err(|e| HdbError::Database(format!("Replace failed: {}", e)))?;
        Ok(result.matched_count > 0)
    }

    /// Mark every matching record deleted; returns how many were live
    pub async fn soft_delete(&self, filter: Document) -> Result<u64, HdbError> {
        let now = DateTime::now();
        let update = doc! {
            "$set": {
                "metadata.is_deleted": true,
                "metadata.deleted_at": now,
                "metadata.updated_at": now,
            }
        };

        let result = self
            .inner
            .update_many(live(filter), update)
            .await
            .map_err(|e| HdbError::Database(format!("Soft delete failed: {}", e)))?;
        Ok(result.modified_count)
    }
}
