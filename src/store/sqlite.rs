//! SQLite-backed document store.
//!
//! One `documents` table with a partial unique index over
//! `(collection, unique_key)`; WAL mode so the ops API can read while
//! campaigns write. Filtering happens in-process: collections here are tens
//! of thousands of rows, not millions.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde_json::Value;
use tracing::info;

use super::{
    apply_find_options, doc_id, matches_filter, merge_shallow, unique_key, DocumentStore,
    FindOptions, InsertOutcome,
};

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA busy_timeout = 10000;

CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    unique_key TEXT,
    doc TEXT NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    PRIMARY KEY (collection, id)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_documents_unique
    ON documents(collection, unique_key) WHERE unique_key IS NOT NULL;

CREATE INDEX IF NOT EXISTS idx_documents_collection
    ON documents(collection, created_at);
"#;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path).with_context(|| format!("open database {path}"))?;
        conn.execute_batch(SCHEMA_SQL).context("apply schema")?;
        info!(path, "document store ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        conn.execute_batch(SCHEMA_SQL).context("apply schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn load_collection(&self, collection: &str) -> Result<Vec<Value>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT doc FROM documents WHERE collection = ?1 ORDER BY created_at, rowid",
            )
            .context("prepare select")?;
        let rows = stmt
            .query_map(params![collection], |row| row.get::<_, String>(0))
            .context("query documents")?;

        let mut docs = Vec::new();
        for row in rows {
            let raw = row.context("read row")?;
            docs.push(serde_json::from_str(&raw).context("decode document")?);
        }
        Ok(docs)
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert_if_absent(
        &self,
        collection: &str,
        doc: Value,
        unique_fields: &[&str],
    ) -> Result<InsertOutcome> {
        let id = doc_id(&doc);
        let key = unique_key(&doc, unique_fields);
        let encoded = serde_json::to_string(&doc).context("encode document")?;

        let conn = self.conn.lock();
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO documents (collection, id, unique_key, doc)
                 VALUES (?1, ?2, ?3, ?4)",
                params![collection, id, key, encoded],
            )
            .context("insert document")?;

        Ok(if inserted > 0 {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::Duplicate
        })
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<()> {
        let conn = self.conn.lock();
        let raw: Option<String> = conn
            .query_row(
                "SELECT doc FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
            .context("select for update")?;

        let Some(raw) = raw else {
            anyhow::bail!("no document {collection}/{id}");
        };

        let mut doc: Value = serde_json::from_str(&raw).context("decode document")?;
        merge_shallow(&mut doc, &patch);
        let encoded = serde_json::to_string(&doc).context("encode document")?;

        conn.execute(
            "UPDATE documents SET doc = ?3 WHERE collection = ?1 AND id = ?2",
            params![collection, id, encoded],
        )
        .context("update document")?;
        Ok(())
    }

    async fn find(
        &self,
        collection: &str,
        filter: Value,
        options: FindOptions,
    ) -> Result<Vec<Value>> {
        let docs = self.load_collection(collection)?;
        let filtered = docs
            .into_iter()
            .filter(|doc| matches_filter(doc, &filter))
            .collect();
        Ok(apply_find_options(filtered, &options))
    }

    async fn count(&self, collection: &str, filter: Value) -> Result<u64> {
        let docs = self.load_collection(collection)?;
        Ok(docs.iter().filter(|doc| matches_filter(doc, &filter)).count() as u64)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )
        .context("delete document")?;
        Ok(())
    }
}
