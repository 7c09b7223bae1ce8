// src/store/mod.rs

//! Collection/id/document storage.
//!
//! Every entity lives as a JSON object in a named collection, keyed by an opaque
//! string id. Backends only know about raw documents; [`Store`] layers typed access
//! on top via the [`Document`] trait and publishes a [`ChangeEvent`] after every
//! successful write so that live views can refresh.

pub mod memory;
pub mod postgres;

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::config::CHANGE_FEED_CAPACITY;

pub use memory::MemoryBackend;
pub use postgres::PgBackend;

/// Raw stored document: a JSON object without its id.
pub type RawDocument = Map<String, Value>;

/// The collections the portal stores documents in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Teachers,
    UserRoles,
    CourseGroups,
    Batches,
    Enrollments,
    Tasks,
    Submissions,
    TaskBookmarks,
    Quotes,
    Testimonials,
    Courses,
    AboutPages,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Teachers => "teachers",
            Collection::UserRoles => "userRoles",
            Collection::CourseGroups => "courseGroups",
            Collection::Batches => "batches",
            Collection::Enrollments => "enrollments",
            Collection::Tasks => "tasks",
            Collection::Submissions => "submissions",
            Collection::TaskBookmarks => "taskBookmarks",
            Collection::Quotes => "quotes",
            Collection::Testimonials => "testimonials",
            Collection::Courses => "courses",
            Collection::AboutPages => "aboutPages",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed document {collection}/{id}: {source}")]
    Malformed {
        collection: Collection,
        id: String,
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Invalid(String),
}

/// Equality condition on a top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: &'static str,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: &'static str, value: impl Into<Value>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }

    pub fn matches(&self, doc: &RawDocument) -> bool {
        doc.get(self.field) == Some(&self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Written,
    Deleted,
}

/// Published on the change feed after every successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub id: String,
    pub kind: ChangeKind,
}

/// Storage backend contract. Writes are atomic per document; nothing spans documents.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<RawDocument>, StoreError>;

    /// All documents matching every filter, ordered by id.
    async fn query(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> Result<Vec<(String, RawDocument)>, StoreError>;

    /// Creates or fully replaces a document.
    async fn set(&self, collection: Collection, id: &str, doc: RawDocument) -> Result<(), StoreError>;

    /// Merges top-level keys into a document. `null` values remove the key.
    /// Returns `false` if the document is missing and `create_missing` is off.
    async fn merge(
        &self,
        collection: Collection,
        id: &str,
        patch: RawDocument,
        create_missing: bool,
    ) -> Result<bool, StoreError>;

    /// Atomically adds `delta` to a numeric field (missing counts as 0).
    async fn increment(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<bool, StoreError>;

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError>;
}

/// A typed entity stored in a collection.
///
/// The id is kept outside the stored body: `to_document` strips it and
/// `from_document` puts it back.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> &str;

    fn to_document(&self) -> Result<RawDocument, StoreError> {
        match serde_json::to_value(self)? {
            Value::Object(mut map) => {
                map.remove("id");
                Ok(map)
            }
            _ => Err(StoreError::Invalid(format!(
                "{} documents must serialize to an object",
                Self::COLLECTION
            ))),
        }
    }

    fn from_document(id: &str, mut raw: RawDocument) -> Result<Self, StoreError> {
        raw.insert("id".to_string(), Value::String(id.to_string()));
        serde_json::from_value(Value::Object(raw)).map_err(|source| StoreError::Malformed {
            collection: Self::COLLECTION,
            id: id.to_string(),
            source,
        })
    }
}

fn into_object(patch: Value) -> Result<RawDocument, StoreError> {
    match patch {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Invalid(format!("patch must be an object, got {}", other))),
    }
}

/// Typed handle over a backend plus the change feed. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn DocumentBackend>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Store {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { backend, changes }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::default()))
    }

    /// Fresh opaque document id.
    pub fn new_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    fn publish(&self, collection: Collection, id: &str, kind: ChangeKind) {
        // Only fails when nobody is listening.
        let _ = self.changes.send(ChangeEvent {
            collection,
            id: id.to_string(),
            kind,
        });
    }

    pub async fn get<T: Document>(&self, id: &str) -> Result<Option<T>, StoreError> {
        match self.backend.get(T::COLLECTION, id).await? {
            Some(raw) => Ok(Some(T::from_document(id, raw)?)),
            None => Ok(None),
        }
    }

    pub async fn find<T: Document>(&self, filters: &[Filter]) -> Result<Vec<T>, StoreError> {
        self.backend
            .query(T::COLLECTION, filters)
            .await?
            .into_iter()
            .map(|(id, raw)| T::from_document(&id, raw))
            .collect()
    }

    /// Creates or fully replaces `doc` under its own id.
    pub async fn save<T: Document>(&self, doc: &T) -> Result<(), StoreError> {
        self.backend
            .set(T::COLLECTION, doc.id(), doc.to_document()?)
            .await?;
        self.publish(T::COLLECTION, doc.id(), ChangeKind::Written);
        Ok(())
    }

    /// Merges `patch` into an existing document. Returns `false` if it does not exist.
    pub async fn update<T: Document>(&self, id: &str, patch: Value) -> Result<bool, StoreError> {
        let updated = self
            .backend
            .merge(T::COLLECTION, id, into_object(patch)?, false)
            .await?;
        if updated {
            self.publish(T::COLLECTION, id, ChangeKind::Written);
        }
        Ok(updated)
    }

    /// Merges `patch` into a document, creating it if needed.
    pub async fn upsert<T: Document>(&self, id: &str, patch: Value) -> Result<(), StoreError> {
        self.backend
            .merge(T::COLLECTION, id, into_object(patch)?, true)
            .await?;
        self.publish(T::COLLECTION, id, ChangeKind::Written);
        Ok(())
    }

    pub async fn increment<T: Document>(
        &self,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<bool, StoreError> {
        let updated = self.backend.increment(T::COLLECTION, id, field, delta).await?;
        if updated {
            self.publish(T::COLLECTION, id, ChangeKind::Written);
        }
        Ok(updated)
    }

    pub async fn delete<T: Document>(&self, id: &str) -> Result<bool, StoreError> {
        let deleted = self.backend.delete(T::COLLECTION, id).await?;
        if deleted {
            self.publish(T::COLLECTION, id, ChangeKind::Deleted);
        }
        Ok(deleted)
    }
}
