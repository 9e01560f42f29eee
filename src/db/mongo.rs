//! MongoDB access layer
//!
//! A thin typed wrapper around the driver: collections apply their
//! schema-declared indexes on open, reads are scoped to exclude
//! soft-deleted documents, and writes stamp the record metadata.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::{
    options::{IndexOptions, UpdateModifications},
    results::{DeleteResult, UpdateResult},
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info};

use crate::db::schemas::Metadata;
use crate::types::FeedlabError;

/// Index definitions a schema wants on its collection
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Access to the bookkeeping metadata embedded in a document
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

fn db_err(op: &str, err: impl std::fmt::Display) -> FeedlabError {
    FeedlabError::Database(format!("{}: {}", op, err))
}

/// Exclude soft-deleted documents from a read filter
fn scoped(mut filter: Document) -> Document {
    filter.insert("metadata.is_deleted", doc! { "$ne": true });
    filter
}

#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and verify with a ping
    ///
    /// A short server-selection timeout keeps an unreachable MongoDB from
    /// hanging startup; the caller degrades to the in-memory store instead.
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, FeedlabError> {
        info!("Connecting to MongoDB at {}", uri);

        let separator = if uri.contains('?') { '&' } else { '?' };
        let timeout_uri = format!(
            "{}{}serverSelectionTimeoutMS=3000&connectTimeoutMS=3000",
            uri, separator
        );

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| db_err("MongoDB connect failed", e))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| db_err("MongoDB ping failed", e))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Open a typed collection and apply its indexes
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, FeedlabError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        let collection = MongoCollection {
            inner: self.client.database(&self.db_name).collection::<T>(name),
        };
        collection.apply_indexes().await?;
        Ok(collection)
    }
}

/// Typed collection handle
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
    async fn apply_indexes(&self) -> Result<(), FeedlabError> {
        let indices: Vec<IndexModel> = T::into_indices()
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();
        if indices.is_empty() {
            return Ok(());
        }

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| db_err("Index creation failed", e))?;
        Ok(())
    }

    /// Insert a document with fresh metadata stamps
    pub async fn insert_one(&self, mut item: T) -> Result<ObjectId, FeedlabError> {
        *item.mut_metadata() = Metadata::new();

        let result = self
            .inner
            .insert_one(item)
            .await
            .map_err(|e| db_err("Insert failed", e))?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| FeedlabError::Database("Insert returned no ObjectId".into()))
    }

    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, FeedlabError> {
        self.inner
            .find_one(scoped(filter))
            .await
            .map_err(|e| db_err("Find failed", e))
    }

    /// Find all matching documents, skipping any that fail to deserialize
    pub async fn find_many(&self, filter: Document) -> Result<Vec<T>, FeedlabError> {
        use futures_util::StreamExt;

        let cursor = self
            .inner
            .find(scoped(filter))
            .await
            .map_err(|e| db_err("Find failed", e))?;

        let results: Vec<T> = cursor
            .filter_map(|item| async {
                match item {
                    Ok(d) => Some(d),
                    Err(e) => {
                        error!("Skipping unreadable document: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }

    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult, FeedlabError> {
        self.inner
            .update_one(filter, update.into())
            .await
            .map_err(|e| db_err("Update failed", e))
    }

    /// Flag matching documents deleted; they vanish from reads but the
    /// captured data stays
    pub async fn soft_delete(&self, filter: Document) -> Result<UpdateResult, FeedlabError> {
        let now = DateTime::now();
        let update = doc! {
            "$set": {
                "metadata.is_deleted": true,
                "metadata.deleted_at": now,
                "metadata.updated_at": now,
            }
        };
        self.update_one(filter, update).await
    }

    /// Hard delete for the admin dataset wipe
    pub async fn delete_many(&self, filter: Document) -> Result<DeleteResult, FeedlabError> {
        self.inner
            .delete_many(filter)
            .await
            .map_err(|e| db_err("Delete failed", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_filter_excludes_soft_deleted() {
        let filter = scoped(doc! { "participant_id": "abc" });
        assert_eq!(filter.get_str("participant_id").unwrap(), "abc");
        let guard = filter.get_document("metadata.is_deleted").unwrap();
        assert_eq!(guard.get_bool("$ne").unwrap(), true);
    }

    #[test]
    fn scoped_filter_on_empty_matches_all_live() {
        let filter = scoped(doc! {});
        assert_eq!(filter.len(), 1);
    }
}
