//! Cleanup after room or tag deletion
//!
//! Trainees reference rooms and tags by value only, so deleting a room or
//! tag record leaves dangling references behind. Cleanup scans all trainees
//! and reverts matching references to the pending sentinel.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::engine::ReconciliationEngine;
use super::report::CleanupReport;
use super::ReconcileResult;
use crate::allocation::same_room;
use crate::models::{AllocationStatus, Patch, Room, Tag};
use crate::storage::{Collection, Record};

/// Identity of a deleted room
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedRoom {
    pub room_number: String,
    pub block: String,
}

impl DeletedRoom {
    pub fn new(block: impl Into<String>, room_number: impl Into<String>) -> Self {
        Self {
            room_number: room_number.into(),
            block: block.into(),
        }
    }
}

impl From<&Room> for DeletedRoom {
    fn from(room: &Room) -> Self {
        Self::new(room.block.clone(), room.room_number.clone())
    }
}

impl fmt::Display for DeletedRoom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block, self.room_number)
    }
}

impl FromStr for DeletedRoom {
    type Err = String;

    /// Parse `BLOCK:NUMBER`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (block, number) = s
            .split_once(':')
            .ok_or_else(|| format!("expected BLOCK:NUMBER, got '{s}'"))?;
        let (block, number) = (block.trim(), number.trim());
        if block.is_empty() || number.is_empty() {
            return Err(format!("expected BLOCK:NUMBER, got '{s}'"));
        }
        Ok(Self::new(block, number))
    }
}

/// Identity of a deleted tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedTag {
    pub tag_no: String,
}

impl DeletedTag {
    pub fn new(tag_no: impl Into<String>) -> Self {
        Self { tag_no: tag_no.into() }
    }
}

impl From<&Tag> for DeletedTag {
    fn from(tag: &Tag) -> Self {
        Self::new(tag.tag_no.clone())
    }
}

fn find_record<'a>(records: &'a [Record], id: &str) -> Option<&'a Record> {
    records.iter().find(|r| r.id == id)
}

impl ReconciliationEngine {
    /// Revert trainee references to deleted rooms and tags
    ///
    /// Room resets clear room number, block and bed-space but leave the
    /// allocation status for the next pass to re-derive. Tag resets clear the
    /// tag and set `no_tags`. Both resets for one trainee go out as one write.
    pub async fn cleanup_after_deletion(
        &self,
        rooms: &[DeletedRoom],
        tags: &[DeletedTag],
    ) -> ReconcileResult<CleanupReport> {
        let _guard = self.begin_pass()?;
        self.revert_references(rooms, tags).await
    }

    async fn revert_references(&self, rooms: &[DeletedRoom], tags: &[DeletedTag]) -> ReconcileResult<CleanupReport> {
        let mut report = CleanupReport::default();
        if rooms.is_empty() && tags.is_empty() {
            return Ok(report);
        }

        let trainees = self.reader.trainees().await?;
        for trainee in &trainees {
            let room_deleted = trainee.room.as_ref().is_some_and(|held| {
                rooms
                    .iter()
                    .any(|d| same_room(held, &d.room_number, &d.block))
            });
            let tag_deleted = trainee.tag_number.as_deref().is_some_and(|held| {
                tags.iter().any(|d| self.matcher.same_tag(held, &d.tag_no))
            });
            if !room_deleted && !tag_deleted {
                continue;
            }

            let mut patch = Patch::new();
            if room_deleted {
                patch = patch.room(None);
            }
            if tag_deleted {
                patch = patch
                    .tag_number(None)
                    .allocation_status(AllocationStatus::NoTags);
            }

            debug!(
                trainee = %trainee.id,
                room_deleted,
                tag_deleted,
                "Reverting references to deleted resources"
            );
            if self.write(Collection::Trainees, &trainee.id, patch).await {
                report.updated_trainee_count += 1;
            } else {
                report.inconsistencies += 1;
            }
        }

        crate::metrics::record_inconsistencies("cleanup", report.inconsistencies);
        info!(
            updated = report.updated_trainee_count,
            inconsistencies = report.inconsistencies,
            "Deletion cleanup finished"
        );
        Ok(report)
    }

    /// Delete room records by id, then clean up the trainees that held them
    pub async fn delete_rooms(&self, ids: &[String]) -> ReconcileResult<CleanupReport> {
        let _guard = self.begin_pass()?;
        let records = self.reader.records(Collection::Rooms).await?;

        let mut deleted = Vec::new();
        let mut rooms_deleted = 0;
        let mut failures = 0;
        for id in ids {
            let Some(record) = find_record(&records, id) else {
                warn!(collection = %Collection::Rooms, id = %id, "Room not found, skipping");
                continue;
            };
            match self.delete_with_retry(Collection::Rooms, id).await {
                Ok(()) => {
                    rooms_deleted += 1;
                    if let Some(room) = Room::from_record(record) {
                        info!(id = %id, room = %DeletedRoom::from(&room), "Room deleted");
                        deleted.push(DeletedRoom::from(&room));
                    }
                }
                Err(e) => {
                    warn!(collection = %Collection::Rooms, id = %id, error = %e, "Room delete failed");
                    failures += 1;
                }
            }
        }

        let mut report = self.revert_references(&deleted, &[]).await?;
        report.rooms_deleted = rooms_deleted;
        report.inconsistencies += failures;
        crate::metrics::record_inconsistencies("delete", failures);
        Ok(report)
    }

    /// Delete tag records by id, then clean up the trainees that held them
    pub async fn delete_tags(&self, ids: &[String]) -> ReconcileResult<CleanupReport> {
        let _guard = self.begin_pass()?;
        let records = self.reader.records(Collection::Tags).await?;

        let mut deleted = Vec::new();
        let mut tags_deleted = 0;
        let mut failures = 0;
        for id in ids {
            let Some(record) = find_record(&records, id) else {
                warn!(collection = %Collection::Tags, id = %id, "Tag not found, skipping");
                continue;
            };
            match self.delete_with_retry(Collection::Tags, id).await {
                Ok(()) => {
                    tags_deleted += 1;
                    if let Some(tag) = Tag::from_record(record) {
                        info!(id = %id, tag = %tag.tag_no, "Tag deleted");
                        deleted.push(DeletedTag::from(&tag));
                    }
                }
                Err(e) => {
                    warn!(collection = %Collection::Tags, id = %id, error = %e, "Tag delete failed");
                    failures += 1;
                }
            }
        }

        let mut report = self.revert_references(&[], &deleted).await?;
        report.tags_deleted = tags_deleted;
        report.inconsistencies += failures;
        crate::metrics::record_inconsistencies("delete", failures);
        Ok(report)
    }
}
