// src/store/memory.rs

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{Collection, DocumentBackend, Filter, RawDocument, StoreError};

/// Process-local backend used for development and tests.
#[derive(Default)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<Collection, BTreeMap<String, RawDocument>>>,
}

fn apply_patch(doc: &mut RawDocument, patch: RawDocument) {
    for (key, value) in patch {
        if value.is_null() {
            doc.remove(&key);
        } else {
            doc.insert(key, value);
        }
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<RawDocument>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn query(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> Result<Vec<(String, RawDocument)>, StoreError> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(&collection) else {
            return Ok(Vec::new());
        };

        Ok(docs
            .iter()
            .filter(|(_, doc)| filters.iter().all(|f| f.matches(doc)))
            .map(|(id, doc)| (id.clone(), doc.clone()))
            .collect())
    }

    async fn set(&self, collection: Collection, id: &str, doc: RawDocument) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection)
            .or_default()
            .insert(id.to_string(), doc);
        Ok(())
    }

    async fn merge(
        &self,
        collection: Collection,
        id: &str,
        patch: RawDocument,
        create_missing: bool,
    ) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();

        match docs.get_mut(id) {
            Some(doc) => {
                apply_patch(doc, patch);
                Ok(true)
            }
            None if create_missing => {
                let mut doc = RawDocument::new();
                apply_patch(&mut doc, patch);
                docs.insert(id.to_string(), doc);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn increment(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(doc) = collections.get_mut(&collection).and_then(|docs| docs.get_mut(id)) else {
            return Ok(false);
        };

        let current = doc.get(field).and_then(Value::as_i64).unwrap_or(0);
        doc.insert(field.to_string(), Value::from(current + delta));
        Ok(true)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(&collection)
            .map(|docs| docs.remove(id).is_some())
            .unwrap_or(false))
    }
}
