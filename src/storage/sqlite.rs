//! SQLite-backed document store
//!
//! All collections live in one `documents` table. Bodies are JSON objects;
//! an autoincrement sequence gives `list_all` a stable insertion order.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{take_requested_id, Collection, DocumentStore, Fields, Record, StoreError, StoreResult};

/// SQLite implementation of [`DocumentStore`]
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite document store initialized");
        Ok(store)
    }

    /// Create in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn connection(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("SQLite connection lock poisoned".to_string()))
    }

    fn create_schema(&self) -> StoreResult<()> {
        let conn = self.connection()?;
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS documents (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    collection TEXT NOT NULL,
                    id TEXT NOT NULL,
                    body TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    UNIQUE (collection, id)
                );

                CREATE INDEX IF NOT EXISTS idx_documents_collection
                    ON documents(collection, seq);
                "#,
        )?;
        Ok(())
    }

    fn decode_body(collection: Collection, id: &str, body: &str) -> StoreResult<Fields> {
        match serde_json::from_str::<serde_json::Value>(body)? {
            serde_json::Value::Object(fields) => Ok(fields),
            other => Err(StoreError::InvalidDocument {
                collection,
                id: id.to_string(),
                reason: format!("expected JSON object, found {other}"),
            }),
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn list_all(&self, collection: Collection) -> StoreResult<Vec<Record>> {
        let conn = self.connection()?;
        let mut stmt =
            conn.prepare("SELECT id, body FROM documents WHERE collection = ?1 ORDER BY seq")?;

        let rows = stmt
            .query_map(params![collection.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, body)| {
                let fields = Self::decode_body(collection, &id, &body)?;
                Ok(Record::new(id, fields))
            })
            .collect()
    }

    async fn patch(&self, collection: Collection, id: &str, mut updates: Fields) -> StoreResult<()> {
        updates.remove(super::ID_FIELD);

        let mut conn = self.connection()?;
        let tx = conn.transaction()?;

        let body: Option<String> = tx
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection.as_str(), id],
                |row| row.get(0),
            )
            .optional()?;
        let body = body.ok_or_else(|| StoreError::not_found(collection, id))?;

        let mut fields = Self::decode_body(collection, id, &body)?;
        for (key, value) in updates {
            fields.insert(key, value);
        }

        tx.execute(
            "UPDATE documents SET body = ?1, updated_at = ?2 WHERE collection = ?3 AND id = ?4",
            params![
                serde_json::to_string(&fields)?,
                Utc::now().to_rfc3339(),
                collection.as_str(),
                id
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    async fn create_record(&self, collection: Collection, mut fields: Fields) -> StoreResult<String> {
        let id = take_requested_id(&mut fields).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let conn = self.connection()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE collection = ?1 AND id = ?2)",
            params![collection.as_str(), id],
            |row| row.get(0),
        )?;
        if exists {
            return Err(StoreError::Conflict { collection, id });
        }

        conn.execute(
            "INSERT INTO documents (collection, id, body, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                collection.as_str(),
                id,
                serde_json::to_string(&fields)?,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(id)
    }

    async fn delete_record(&self, collection: Collection, id: &str) -> StoreResult<()> {
        let conn = self.connection()?;
        let deleted = conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection.as_str(), id],
        )?;
        if deleted == 0 {
            return Err(StoreError::not_found(collection, id));
        }
        Ok(())
    }
}
