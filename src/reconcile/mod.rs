//! Allocation reconciliation
//!
//! The orchestration layer: reads full snapshots of the three collections,
//! computes target state with the pure functions in [`crate::allocation`],
//! and writes back only the records that differ.
//!
//! # Pass Order
//!
//! ```text
//! snapshot ──▶ room repair ──▶ tag repair ──▶ tag allocation ──▶ room allocation ──▶ summary
//! ```
//!
//! Each step carries its writes forward in the in-memory snapshot, so later
//! steps observe the state produced by earlier ones without re-reading.
//! A crash mid-pass leaves partial state that the next pass heals.

pub mod cleanup;
pub mod engine;
pub mod migration;
pub mod report;
pub mod snapshot;

use thiserror::Error;

use crate::storage::{Collection, StoreError};

pub use cleanup::{DeletedRoom, DeletedTag};
pub use engine::{NewTrainee, Registration, ReconciliationEngine};
pub use report::{
    CleanupReport, MigrationReport, RoomCounts, SyncReport, SyncSummary, TagCounts, TraineeCounts,
};
pub use snapshot::{PoolReader, PoolSnapshot};

/// Errors that abort a whole reconciliation operation
///
/// Per-record failures never surface here; they are counted as
/// inconsistencies in the operation's report.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// A collection snapshot could not be read
    #[error("failed to read {collection} snapshot: {source}")]
    Snapshot {
        collection: Collection,
        #[source]
        source: StoreError,
    },

    /// Another pass is already running on this engine
    #[error("a reconciliation pass is already in progress")]
    PassInProgress,

    /// Store error outside a per-record batch loop
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReconcileError {
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Snapshot { source, .. } => source.is_recoverable(),
            Self::PassInProgress => true,
            Self::Store(e) => e.is_recoverable(),
        }
    }
}

/// Result type for reconciliation operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;
