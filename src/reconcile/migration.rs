//! Legacy trainee migration
//!
//! Older trainee documents predate the `allocationStatus` field and some
//! lack the allocation fields entirely. Migration derives the status from
//! the resources a trainee actually holds and backfills missing fields with
//! the pending sentinel. Running it again changes nothing.

use tracing::{debug, info};

use super::engine::ReconciliationEngine;
use super::report::MigrationReport;
use super::ReconcileResult;
use crate::models::{Patch, Trainee};
use crate::storage::Collection;

/// Patch that brings one legacy trainee up to date, if any is needed
fn migration_patch(trainee: &Trainee) -> Option<Patch> {
    let mut patch = trainee
        .missing_fields
        .iter()
        .fold(Patch::new(), |patch, key| patch.pending(key));
    if trainee.allocation_status.is_none() {
        patch = patch.allocation_status(trainee.derived_status());
    }
    (!patch.is_empty()).then_some(patch)
}

impl ReconciliationEngine {
    /// Backfill allocation status and sentinel fields on legacy trainees
    pub async fn migrate_legacy_trainees(&self) -> ReconcileResult<MigrationReport> {
        let _guard = self.begin_pass()?;
        let trainees = self.reader.trainees().await?;

        let mut report = MigrationReport {
            scanned: trainees.len(),
            ..MigrationReport::default()
        };
        for trainee in &trainees {
            let Some(patch) = migration_patch(trainee) else {
                continue;
            };
            debug!(trainee = %trainee.id, fields = %patch.describe(), "Migrating legacy trainee");
            if self.write(Collection::Trainees, &trainee.id, patch).await {
                report.migrated += 1;
            } else {
                report.inconsistencies += 1;
            }
        }

        crate::metrics::record_inconsistencies("migration", report.inconsistencies);
        info!(
            scanned = report.scanned,
            migrated = report.migrated,
            inconsistencies = report.inconsistencies,
            "Legacy migration finished"
        );
        Ok(report)
    }
}
