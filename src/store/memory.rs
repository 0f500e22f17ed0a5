//! In-memory document store for tests and ephemeral runs.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::{
    apply_find_options, doc_id, matches_filter, merge_shallow, unique_key, DocumentStore,
    FindOptions, InsertOutcome,
};

#[derive(Default)]
struct Collection {
    /// Insertion order is find order, matching the sqlite store.
    docs: Vec<Value>,
    unique_keys: std::collections::HashSet<String>,
    /// Unique key per document id, so deletes release the key.
    keys_by_id: HashMap<String, String>,
}

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_if_absent(
        &self,
        collection: &str,
        mut doc: Value,
        unique_fields: &[&str],
    ) -> Result<InsertOutcome> {
        let mut collections = self.collections.lock();
        let entry = collections.entry(collection.to_string()).or_default();

        let id = doc_id(&doc);
        if let Some(key) = unique_key(&doc, unique_fields) {
            if !entry.unique_keys.insert(key.clone()) {
                return Ok(InsertOutcome::Duplicate);
            }
            entry.keys_by_id.insert(id.clone(), key);
        }

        if let Value::Object(map) = &mut doc {
            map.entry("id".to_string())
                .or_insert_with(|| Value::String(id));
        }
        entry.docs.push(doc);
        Ok(InsertOutcome::Inserted)
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<()> {
        let mut collections = self.collections.lock();
        let entry = collections.entry(collection.to_string()).or_default();
        let Some(doc) = entry
            .docs
            .iter_mut()
            .find(|doc| doc.get("id").and_then(Value::as_str) == Some(id))
        else {
            anyhow::bail!("no document {collection}/{id}");
        };
        merge_shallow(doc, &patch);
        Ok(())
    }

    async fn find(
        &self,
        collection: &str,
        filter: Value,
        options: FindOptions,
    ) -> Result<Vec<Value>> {
        let collections = self.collections.lock();
        let docs = collections
            .get(collection)
            .map(|entry| {
                entry
                    .docs
                    .iter()
                    .filter(|doc| matches_filter(doc, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(apply_find_options(docs, &options))
    }

    async fn count(&self, collection: &str, filter: Value) -> Result<u64> {
        let collections = self.collections.lock();
        Ok(collections
            .get(collection)
            .map(|entry| {
                entry
                    .docs
                    .iter()
                    .filter(|doc| matches_filter(doc, &filter))
                    .count() as u64
            })
            .unwrap_or(0))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut collections = self.collections.lock();
        if let Some(entry) = collections.get_mut(collection) {
            entry
                .docs
                .retain(|doc| doc.get("id").and_then(Value::as_str) != Some(id));
            if let Some(key) = entry.keys_by_id.remove(id) {
                entry.unique_keys.remove(&key);
            }
        }
        Ok(())
    }
}
