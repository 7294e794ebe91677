//! Reports returned by reconciliation operations
//!
//! All reports serialize with camelCase keys so the JSON output of the CLI
//! matches the field names the portal UI consumes.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::allocation::{occupancy_counts, occupancy_with};
use crate::models::{AllocationStatus, Room, RoomStatus, Tag, TagStatus, Trainee};

/// Outcome of one `synchronize` pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Trainees that received a tag this pass
    pub allocated: usize,
    /// Tagged trainees left without a room
    pub no_rooms: usize,
    /// Trainees left without a tag because the pool is exhausted
    pub no_tags: usize,
    /// Room records whose status or occupancy was rewritten
    pub rooms_updated: usize,
    /// Tag records whose status was rewritten
    pub tags_updated: usize,
    /// Per-record writes that failed
    pub inconsistencies: usize,
    /// Trainees that received a room this pass
    pub rooms_assigned: usize,
    /// Trainees whose stored status alone was corrected
    pub status_corrected: usize,
    pub summary: SyncSummary,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl SyncReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            allocated: 0,
            no_rooms: 0,
            no_tags: 0,
            rooms_updated: 0,
            tags_updated: 0,
            inconsistencies: 0,
            rooms_assigned: 0,
            status_corrected: 0,
            summary: SyncSummary::default(),
            started_at,
            duration_ms: 0,
        }
    }

    /// Whether the pass found nothing to allocate or repair
    pub fn is_fixed_point(&self) -> bool {
        self.allocated == 0
            && self.rooms_updated == 0
            && self.tags_updated == 0
            && self.rooms_assigned == 0
            && self.status_corrected == 0
    }

    /// Human-readable multi-line rendering
    pub fn display(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Synchronization finished in {} ms", self.duration_ms);
        let _ = writeln!(out, "  Tags allocated:      {}", self.allocated);
        let _ = writeln!(out, "  Rooms assigned:      {}", self.rooms_assigned);
        let _ = writeln!(out, "  No tags available:   {}", self.no_tags);
        let _ = writeln!(out, "  No rooms available:  {}", self.no_rooms);
        let _ = writeln!(out, "  Rooms updated:       {}", self.rooms_updated);
        let _ = writeln!(out, "  Tags updated:        {}", self.tags_updated);
        let _ = writeln!(out, "  Statuses corrected:  {}", self.status_corrected);
        if self.inconsistencies > 0 {
            let _ = writeln!(
                out,
                "  {} inconsistencies encountered (see log for record ids)",
                self.inconsistencies
            );
        }
        out.push('\n');
        out.push_str(&self.summary.display());
        out
    }
}

/// Trainee totals by allocation status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraineeCounts {
    pub total: usize,
    pub pending: usize,
    pub allocated: usize,
    pub no_rooms: usize,
    pub no_tags: usize,
    /// Stored status absent or unrecognized
    pub unknown: usize,
}

/// Room totals by stored status, plus bed usage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCounts {
    pub total: usize,
    pub available: usize,
    pub partially_occupied: usize,
    pub fully_occupied: usize,
    pub maintenance: usize,
    pub unknown: usize,
    pub occupied_beds: u64,
    pub total_beds: u64,
}

/// Tag totals by stored status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagCounts {
    pub total: usize,
    pub available: usize,
    pub assigned: usize,
    pub unknown: usize,
}

/// Aggregate counts across the three collections
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub trainees: TraineeCounts,
    pub rooms: RoomCounts,
    pub tags: TagCounts,
}

impl SyncSummary {
    /// Tally stored statuses; bed usage is computed from trainee placement
    pub fn tally(trainees: &[Trainee], rooms: &[Room], tags: &[Tag]) -> Self {
        let mut summary = Self::default();

        let t = &mut summary.trainees;
        t.total = trainees.len();
        for trainee in trainees {
            match trainee.allocation_status {
                Some(AllocationStatus::Pending) => t.pending += 1,
                Some(AllocationStatus::Allocated) => t.allocated += 1,
                Some(AllocationStatus::NoRooms) => t.no_rooms += 1,
                Some(AllocationStatus::NoTags) => t.no_tags += 1,
                None => t.unknown += 1,
            }
        }

        let r = &mut summary.rooms;
        r.total = rooms.len();
        let counts = occupancy_counts(rooms, trainees);
        for (room, &occupants) in rooms.iter().zip(&counts) {
            match room.status {
                Some(RoomStatus::Available) => r.available += 1,
                Some(RoomStatus::PartiallyOccupied) => r.partially_occupied += 1,
                Some(RoomStatus::FullyOccupied) => r.fully_occupied += 1,
                Some(RoomStatus::Maintenance) => r.maintenance += 1,
                None => r.unknown += 1,
            }
            let occupancy = occupancy_with(room, occupants);
            r.occupied_beds += u64::from(occupancy.occupancy);
            r.total_beds += u64::from(occupancy.capacity);
        }

        let g = &mut summary.tags;
        g.total = tags.len();
        for tag in tags {
            match tag.status {
                Some(TagStatus::Available) => g.available += 1,
                Some(TagStatus::Assigned) => g.assigned += 1,
                None => g.unknown += 1,
            }
        }

        summary
    }

    pub fn display(&self) -> String {
        let t = &self.trainees;
        let r = &self.rooms;
        let g = &self.tags;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Trainees: {} total ({} allocated, {} pending, {} no_rooms, {} no_tags, {} unknown)",
            t.total, t.allocated, t.pending, t.no_rooms, t.no_tags, t.unknown
        );
        let _ = writeln!(
            out,
            "Rooms:    {} total ({} available, {} partially occupied, {} fully occupied, {} maintenance), beds {}/{}",
            r.total, r.available, r.partially_occupied, r.fully_occupied, r.maintenance,
            r.occupied_beds, r.total_beds
        );
        let _ = writeln!(
            out,
            "Tags:     {} total ({} available, {} assigned)",
            g.total, g.available, g.assigned
        );
        out
    }
}

/// Outcome of cleanup after rooms or tags were deleted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub updated_trainee_count: usize,
    pub inconsistencies: usize,
    pub rooms_deleted: usize,
    pub tags_deleted: usize,
}

/// Outcome of the legacy trainee migration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub scanned: usize,
    pub migrated: usize,
    pub inconsistencies: usize,
}
