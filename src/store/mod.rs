//! Document-store capability.
//!
//! The engine persists campaigns, leads and companies as JSON documents.
//! Uniqueness is enforced by the store, not by callers: `insert_if_absent`
//! is the dedupe point for `(tenantId, providerId)` and
//! `(tenantId, linkedInUrl)`.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub const CAMPAIGNS: &str = "campaigns";
pub const LEADS: &str = "leads";
pub const COMPANIES: &str = "companies";
pub const CHECKPOINTS: &str = "checkpoints";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub sort: Option<(String, SortOrder)>,
    pub skip: usize,
    pub limit: Option<usize>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert unless a document with the same values for `unique_fields`
    /// already exists in the collection. Documents carry their id in an
    /// `id` field.
    async fn insert_if_absent(
        &self,
        collection: &str,
        doc: Value,
        unique_fields: &[&str],
    ) -> Result<InsertOutcome>;

    /// Shallow-merge `patch` into the document with the given id.
    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<()>;

    /// Top-level field-equality filter; `Value::Null` matches everything.
    async fn find(&self, collection: &str, filter: Value, options: FindOptions)
        -> Result<Vec<Value>>;

    async fn count(&self, collection: &str, filter: Value) -> Result<u64>;

    async fn delete(&self, collection: &str, id: &str) -> Result<()>;
}

/// Subset match on top-level fields.
pub(crate) fn matches_filter(doc: &Value, filter: &Value) -> bool {
    match filter {
        Value::Null => true,
        Value::Object(map) => map
            .iter()
            .all(|(key, expected)| doc.get(key) == Some(expected)),
        _ => false,
    }
}

/// Join unique-field values into a collision-safe key. `None` when the
/// caller requested no uniqueness.
pub(crate) fn unique_key(doc: &Value, unique_fields: &[&str]) -> Option<String> {
    if unique_fields.is_empty() {
        return None;
    }
    let parts: Vec<String> = unique_fields
        .iter()
        .map(|field| match doc.get(*field) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        })
        .collect();
    Some(parts.join("\u{1}"))
}

pub(crate) fn doc_id(doc: &Value) -> String {
    doc.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

pub(crate) fn merge_shallow(doc: &mut Value, patch: &Value) {
    if let (Value::Object(target), Value::Object(changes)) = (doc, patch) {
        for (key, value) in changes {
            target.insert(key.clone(), value.clone());
        }
    }
}

pub(crate) fn apply_find_options(mut docs: Vec<Value>, options: &FindOptions) -> Vec<Value> {
    if let Some((field, order)) = &options.sort {
        docs.sort_by(|a, b| {
            let left = a.get(field);
            let right = b.get(field);
            let ordering = compare_values(left, right);
            match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
    }
    docs.into_iter()
        .skip(options.skip)
        .take(options.limit.unwrap_or(usize::MAX))
        .collect()
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}
