//! Document store abstraction for the allocation collections
//!
//! The allocation core never talks to a concrete database. It consumes the
//! four-operation collaborator interface defined by [`DocumentStore`] and
//! works on schemaless [`Record`]s, so any managed document database can sit
//! behind it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  ReconciliationEngine                       │
//! │           (snapshot reader, cleanup, migration)             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    DocumentStore trait                      │
//! │     list_all · patch · create_record · delete_record        │
//! └─────────────────────────────────────────────────────────────┘
//!                  │                           │
//!                  ▼                           ▼
//!        ┌─────────────────┐         ┌─────────────────┐
//!        │     SQLite      │         │     Memory      │
//!        │   SqliteStore   │         │   MemoryStore   │
//!        └─────────────────┘         └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use billet::storage::{open_store, Collection};
//!
//! let store = open_store(&config.store)?;
//! let rooms = store.list_all(Collection::Rooms).await?;
//! ```

pub mod memory;
pub mod sqlite;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::{StoreBackend, StoreConfig};

pub use memory::{InjectedFailure, MemoryStore};
pub use sqlite::SqliteStore;

/// Field map of a stored document
pub type Fields = serde_json::Map<String, Value>;

/// Field name that carries a caller-chosen identity on creation
pub const ID_FIELD: &str = "id";

// ============================================================================
// Core Types
// ============================================================================

/// Collections the allocation core reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Trainees,
    Rooms,
    Tags,
}

impl Collection {
    /// Stored collection name
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Trainees => "trainees",
            Collection::Rooms => "rooms",
            Collection::Tags => "tags",
        }
    }

    /// All collections in reconciliation order
    pub fn all() -> [Collection; 3] {
        [Collection::Trainees, Collection::Rooms, Collection::Tags]
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trainees" | "trainee" => Ok(Collection::Trainees),
            "rooms" | "room" => Ok(Collection::Rooms),
            "tags" | "tag" => Ok(Collection::Tags),
            other => Err(StoreError::UnknownCollection(other.to_string())),
        }
    }
}

/// A stored document with its store-assigned identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub fields: Fields,
}

impl Record {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a field as a string slice
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// Split an optional caller-chosen id out of a field map
pub(crate) fn take_requested_id(fields: &mut Fields) -> Option<String> {
    match fields.remove(ID_FIELD) {
        Some(Value::String(id)) if !id.trim().is_empty() => Some(id.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by document store backends
#[derive(Error, Debug)]
pub enum StoreError {
    /// Target record does not exist
    #[error("record '{id}' not found in collection '{collection}'")]
    NotFound { collection: Collection, id: String },

    /// A record with the requested id already exists
    #[error("record '{id}' already exists in collection '{collection}'")]
    Conflict { collection: Collection, id: String },

    /// Operation did not complete in time
    #[error("store operation '{operation}' timed out")]
    Timeout { operation: String },

    /// Backend temporarily unreachable
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Collection name not recognized
    #[error("unknown collection '{0}'")]
    UnknownCollection(String),

    /// Stored document body could not be interpreted
    #[error("invalid document '{id}' in '{collection}': {reason}")]
    InvalidDocument {
        collection: Collection,
        id: String,
        reason: String,
    },

    /// SQLite backend error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON encoding/decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Create a not-found error
    pub fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection,
            id: id.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Check if the error is transient and the operation may be retried
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Unavailable(_) => true,
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

// ============================================================================
// Store Trait
// ============================================================================

/// Store-agnostic collaborator interface
///
/// Backends must return records from [`list_all`](DocumentStore::list_all) in
/// a stable order (insertion order for the bundled backends) and must fail
/// [`patch`](DocumentStore::patch) with [`StoreError::NotFound`] when the id is
/// absent.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// List every record in a collection
    async fn list_all(&self, collection: Collection) -> StoreResult<Vec<Record>>;

    /// Merge `updates` into an existing record
    async fn patch(&self, collection: Collection, id: &str, updates: Fields) -> StoreResult<()>;

    /// Insert a new record and return its id
    ///
    /// A string `id` field, when present, is used as the record identity.
    async fn create_record(&self, collection: Collection, fields: Fields) -> StoreResult<String>;

    /// Delete a record
    async fn delete_record(&self, collection: Collection, id: &str) -> StoreResult<()>;
}

/// Thread-safe shared store handle
pub type SharedStore = Arc<dyn DocumentStore>;

/// Open the backend selected by configuration
pub fn open_store(config: &StoreConfig) -> StoreResult<SharedStore> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory document store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Sqlite => {
            let store = SqliteStore::open(&config.sqlite_path)?;
            Ok(Arc::new(store))
        }
    }
}
