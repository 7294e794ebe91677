//! billet - Training portal allocation engine
//!
//! Assigns rooms, bed-spaces and identification tags to trainees and keeps
//! the three independently mutable collections consistent with each other.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`models`] - Trainee, room and tag views and the sentinel boundary
//! - [`storage`] - Document store trait and backends (SQLite, memory)
//! - [`allocation`] - Pure occupancy, tag and room allocation rules
//! - [`reconcile`] - Reconciliation passes, cleanup and migration
//! - [`metrics`] - Prometheus metrics
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use billet::config::Config;
//! use billet::reconcile::ReconciliationEngine;
//! use billet::storage::open_store;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let store = open_store(&config.store)?;
//!     let engine = ReconciliationEngine::from_config(store, &config);
//!     let report = engine.synchronize().await?;
//!     println!("{}", report.display());
//!     Ok(())
//! }
//! ```

pub mod allocation;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod reconcile;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{BilletErrorTrait, Error, ErrorCategory, Result};
    pub use crate::models::{AllocationStatus, Gender, Room, RoomStatus, Tag, TagStatus, Trainee};
    pub use crate::reconcile::{ReconciliationEngine, SyncReport};
    pub use crate::storage::{Collection, DocumentStore, MemoryStore, SharedStore, SqliteStore};
}

// Direct re-exports for convenience
pub use models::{AllocationStatus, Gender, RoomStatus, TagStatus};
