//! Reconciliation engine
//!
//! Orchestrates a full pass over trainees, rooms and tags, plus the
//! single-trainee allocation paths used at registration time.
//!
//! The engine is the only component that performs I/O. It loads one
//! snapshot, asks the pure calculators in [`crate::allocation`] for target
//! state, writes only the fields that differ, and updates the snapshot in
//! memory after every successful write so later steps see current state.

use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::report::SyncReport;
use super::snapshot::{PoolReader, PoolSnapshot};
use super::{ReconcileError, ReconcileResult};
use crate::allocation::{
    find_room, find_room_counted, next_unheld_tag, occupancy_counts, occupancy_with, same_room,
    target_status, BlockPolicy, TagMatcher,
};
use crate::config::Config;
use crate::models::{
    fields, AllocationStatus, Gender, Patch, Room, RoomAssignment, RoomRef, RoomStatus, TagStatus,
    Trainee, PENDING,
};
use crate::storage::{Collection, Fields, SharedStore, StoreError, StoreResult};
use crate::utils::retry::{with_retry_if, RetryConfig};

/// Result of attempting one record write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteOutcome {
    /// Stored values were already current
    Unchanged,
    Written,
    Failed,
}

impl WriteOutcome {
    /// Add this outcome to a change counter or to the inconsistency counter
    pub(crate) fn tally(self, changed: &mut usize, inconsistencies: &mut usize) {
        match self {
            WriteOutcome::Unchanged => {}
            WriteOutcome::Written => *changed += 1,
            WriteOutcome::Failed => *inconsistencies += 1,
        }
    }
}

/// Stored room state that differs from the target for `occupants`
fn room_delta(room: &Room, occupants: u32) -> Option<(Patch, RoomStatus, u32)> {
    let occupancy = occupancy_with(room, occupants);
    let status = target_status(room, &occupancy);

    let mut patch = Patch::new();
    if room.status != Some(status) {
        patch = patch.room_status(status);
    }
    if room.current_occupancy != Some(occupancy.occupancy) {
        patch = patch.current_occupancy(occupancy.occupancy);
    }
    (!patch.is_empty()).then_some((patch, status, occupancy.occupancy))
}

// ============================================================================
// Registration Types
// ============================================================================

/// A trainee about to be registered
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrainee {
    pub gender: Gender,
    /// Additional fields stored verbatim (name, batch, ...)
    pub fields: Fields,
}

impl NewTrainee {
    pub fn new(gender: Gender) -> Self {
        Self {
            gender,
            fields: Fields::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Document written on creation; allocation fields always start pending
    fn into_fields(self) -> Fields {
        let mut doc = self.fields;
        doc.insert(fields::GENDER.into(), Value::from(self.gender.as_str()));
        for key in fields::TRAINEE_SENTINEL_FIELDS {
            doc.insert(key.into(), Value::from(PENDING));
        }
        doc.insert(
            fields::ALLOCATION_STATUS.into(),
            Value::from(AllocationStatus::Pending.as_str()),
        );
        doc
    }
}

/// Outcome of registering one trainee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub status: AllocationStatus,
    pub tag_number: Option<String>,
    pub room: Option<RoomAssignment>,
}

// ============================================================================
// Engine
// ============================================================================

/// Allocation reconciliation engine
pub struct ReconciliationEngine {
    pub(super) store: SharedStore,
    pub(super) reader: PoolReader,
    policy: BlockPolicy,
    pub(super) matcher: TagMatcher,
    retry: RetryConfig,
    pass_guard: Mutex<()>,
}

impl ReconciliationEngine {
    /// Create an engine with the default block policy and retry settings
    pub fn new(store: SharedStore) -> Self {
        Self {
            reader: PoolReader::new(store.clone()),
            store,
            policy: BlockPolicy::default(),
            matcher: TagMatcher::default(),
            retry: RetryConfig::default(),
            pass_guard: Mutex::new(()),
        }
    }

    pub fn from_config(store: SharedStore, config: &Config) -> Self {
        Self::new(store)
            .with_policy(config.allocation.block_policy())
            .with_matcher(config.allocation.matcher())
            .with_retry(config.retry.clone())
    }

    pub fn with_policy(mut self, policy: BlockPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_matcher(mut self, matcher: TagMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn policy(&self) -> &BlockPolicy {
        &self.policy
    }

    pub fn reader(&self) -> &PoolReader {
        &self.reader
    }

    /// Claim exclusive use of the engine for one batch operation
    pub(super) fn begin_pass(&self) -> ReconcileResult<MutexGuard<'_, ()>> {
        self.pass_guard
            .try_lock()
            .map_err(|_| ReconcileError::PassInProgress)
    }

    pub(super) async fn patch_with_retry(
        &self,
        collection: Collection,
        id: &str,
        patch: Patch,
    ) -> StoreResult<()> {
        let updates = patch.into_fields();
        with_retry_if(
            &self.retry,
            || self.store.patch(collection, id, updates.clone()),
            StoreError::is_recoverable,
        )
        .await
    }

    pub(super) async fn delete_with_retry(&self, collection: Collection, id: &str) -> StoreResult<()> {
        with_retry_if(
            &self.retry,
            || self.store.delete_record(collection, id),
            StoreError::is_recoverable,
        )
        .await
    }

    /// Apply a patch inside a batch loop
    ///
    /// Returns whether the write landed. Failures are logged with enough
    /// context to repair the record by hand and never abort the caller.
    pub(super) async fn write(&self, collection: Collection, id: &str, patch: Patch) -> bool {
        if patch.is_empty() {
            return true;
        }
        let described = patch.describe();

        match self.patch_with_retry(collection, id, patch).await {
            Ok(()) => {
                debug!(collection = %collection, id = %id, fields = %described, "Record updated");
                true
            }
            Err(e) => {
                warn!(
                    collection = %collection,
                    id = %id,
                    fields = %described,
                    error = %e,
                    "Record update failed"
                );
                false
            }
        }
    }

    // ------------------------------------------------------------------------
    // Full pass
    // ------------------------------------------------------------------------

    /// Run one full reconciliation pass
    ///
    /// Fails only when the initial snapshot cannot be read or another pass
    /// is running. Per-record failures are counted in
    /// [`SyncReport::inconsistencies`].
    pub async fn synchronize(&self) -> ReconcileResult<SyncReport> {
        let _guard = self.begin_pass()?;
        let started = Instant::now();
        let mut report = SyncReport::new(Utc::now());

        info!("Starting reconciliation pass");
        let mut pool = self.reader.load().await?;

        self.repair_rooms(&mut pool, &mut report).await;
        self.repair_tags(&mut pool, &mut report).await;
        self.allocate_tags(&mut pool, &mut report).await;
        self.allocate_rooms(&mut pool, &mut report).await;

        report.summary = match self.reader.load().await {
            Ok(fresh) => fresh.summarize(),
            Err(e) => {
                warn!(error = %e, "Summary re-read failed, summarizing in-memory state");
                report.inconsistencies += 1;
                pool.summarize()
            }
        };

        let elapsed = started.elapsed();
        report.duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        crate::metrics::record_sync_pass(&report, elapsed);

        info!(
            allocated = report.allocated,
            rooms_assigned = report.rooms_assigned,
            no_tags = report.no_tags,
            no_rooms = report.no_rooms,
            rooms_updated = report.rooms_updated,
            tags_updated = report.tags_updated,
            status_corrected = report.status_corrected,
            inconsistencies = report.inconsistencies,
            duration_ms = report.duration_ms,
            "Reconciliation pass finished"
        );
        Ok(report)
    }

    /// Rewrite a room's status and occupancy if they are stale
    ///
    /// `counts` holds the current occupant count of every snapshot room.
    async fn refresh_room(
        &self,
        pool: &mut PoolSnapshot,
        counts: &[u32],
        index: usize,
    ) -> WriteOutcome {
        let (Some(room), Some(&occupants)) = (pool.rooms.get(index), counts.get(index)) else {
            return WriteOutcome::Unchanged;
        };
        let Some((patch, status, occupancy)) = room_delta(room, occupants) else {
            return WriteOutcome::Unchanged;
        };
        let id = room.id.clone();

        if self.write(Collection::Rooms, &id, patch).await {
            let room = &mut pool.rooms[index];
            room.status = Some(status);
            room.current_occupancy = Some(occupancy);
            WriteOutcome::Written
        } else {
            WriteOutcome::Failed
        }
    }

    /// Refresh every room record that names the given room
    async fn refresh_rooms_matching(
        &self,
        pool: &mut PoolSnapshot,
        counts: &[u32],
        room_ref: &RoomRef,
        report: &mut SyncReport,
    ) {
        let indices: Vec<usize> = pool
            .rooms
            .iter()
            .enumerate()
            .filter(|(_, r)| same_room(room_ref, &r.room_number, &r.block))
            .map(|(i, _)| i)
            .collect();

        for index in indices {
            self.refresh_room(pool, counts, index)
                .await
                .tally(&mut report.rooms_updated, &mut report.inconsistencies);
        }
    }

    /// Store a trainee's allocation status if it differs
    async fn set_status(&self, pool: &mut PoolSnapshot, index: usize, status: AllocationStatus) -> WriteOutcome {
        let trainee = &pool.trainees[index];
        if trainee.allocation_status == Some(status) {
            return WriteOutcome::Unchanged;
        }
        let id = trainee.id.clone();

        if self
            .write(Collection::Trainees, &id, Patch::new().allocation_status(status))
            .await
        {
            pool.trainees[index].allocation_status = Some(status);
            WriteOutcome::Written
        } else {
            WriteOutcome::Failed
        }
    }

    /// Step 1: recompute every room's status from occupancy
    async fn repair_rooms(&self, pool: &mut PoolSnapshot, report: &mut SyncReport) {
        let counts = occupancy_counts(&pool.rooms, &pool.trainees);
        for index in 0..pool.rooms.len() {
            self.refresh_room(pool, &counts, index)
                .await
                .tally(&mut report.rooms_updated, &mut report.inconsistencies);
        }
    }

    /// Step 2: make tag status agree with trainee references
    async fn repair_tags(&self, pool: &mut PoolSnapshot, report: &mut SyncReport) {
        for index in 0..pool.tags.len() {
            let tag = &pool.tags[index];
            let referenced = pool.trainees.iter().any(|t| self.matcher.holds(t, tag));
            let target = match (referenced, tag.status) {
                (true, Some(TagStatus::Assigned)) => continue,
                (false, Some(TagStatus::Available) | None) => continue,
                (true, _) => TagStatus::Assigned,
                (false, Some(TagStatus::Assigned)) => TagStatus::Available,
            };
            let id = tag.id.clone();

            if referenced {
                debug!(tag = %pool.tags[index].tag_no, "Tag is held by a trainee but stored available");
            } else {
                debug!(tag = %pool.tags[index].tag_no, "Tag is stored assigned but held by no trainee");
            }

            if self.write(Collection::Tags, &id, Patch::new().tag_status(target)).await {
                pool.tags[index].status = Some(target);
                report.tags_updated += 1;
            } else {
                report.inconsistencies += 1;
            }
        }
    }

    /// Mark every tag record carrying `tag_no` as assigned
    async fn claim_tag_records(&self, pool: &mut PoolSnapshot, tag_no: &str, report: &mut SyncReport) {
        for index in 0..pool.tags.len() {
            let tag = &pool.tags[index];
            if tag.status == Some(TagStatus::Assigned) || !self.matcher.same_tag(&tag.tag_no, tag_no) {
                continue;
            }
            let id = tag.id.clone();

            // The trainee already references this tag, so it is taken even if
            // the status write fails; the next pass repairs the stored label.
            pool.tags[index].status = Some(TagStatus::Assigned);
            if self
                .write(Collection::Tags, &id, Patch::new().tag_status(TagStatus::Assigned))
                .await
            {
                report.tags_updated += 1;
            } else {
                report.inconsistencies += 1;
            }
        }
    }

    /// Step 3: hand out tags to trainees without one
    async fn allocate_tags(&self, pool: &mut PoolSnapshot, report: &mut SyncReport) {
        for index in 0..pool.trainees.len() {
            if pool.trainees[index].has_tag() {
                continue;
            }
            let trainee_id = pool.trainees[index].id.clone();

            let chosen = next_unheld_tag(&pool.tags, &pool.trainees, &self.matcher).map(|t| t.tag_no.clone());
            let Some(tag_no) = chosen else {
                debug!(trainee = %trainee_id, "No tag available");
                report.no_tags += 1;
                let mut ignored = 0;
                self.set_status(pool, index, AllocationStatus::NoTags)
                    .await
                    .tally(&mut ignored, &mut report.inconsistencies);
                continue;
            };

            let patch = Patch::new()
                .tag_number(Some(&tag_no))
                .allocation_status(AllocationStatus::Allocated);
            if !self.write(Collection::Trainees, &trainee_id, patch).await {
                report.inconsistencies += 1;
                continue;
            }

            let trainee = &mut pool.trainees[index];
            trainee.tag_number = Some(tag_no.clone());
            trainee.allocation_status = Some(AllocationStatus::Allocated);
            report.allocated += 1;
            debug!(trainee = %trainee_id, tag = %tag_no, "Tag allocated");

            self.claim_tag_records(pool, &tag_no, report).await;
        }
    }

    /// Step 4: find rooms for tagged trainees and correct stale statuses
    async fn allocate_rooms(&self, pool: &mut PoolSnapshot, report: &mut SyncReport) {
        let mut counts = occupancy_counts(&pool.rooms, &pool.trainees);
        for index in 0..pool.trainees.len() {
            let trainee = &pool.trainees[index];
            if !trainee.has_tag() {
                continue;
            }
            let status = trainee.allocation_status;

            if trainee.has_room() {
                if status != Some(AllocationStatus::Allocated) {
                    self.set_status(pool, index, AllocationStatus::Allocated)
                        .await
                        .tally(&mut report.status_corrected, &mut report.inconsistencies);
                }
                continue;
            }
            let trainee_id = trainee.id.clone();
            if status.is_none() {
                debug!(
                    trainee = %trainee_id,
                    "Trainee has a tag but no recognized allocation status, waiting for migration"
                );
                continue;
            }

            let Some(gender) = trainee.gender else {
                warn!(trainee = %trainee_id, "Trainee has no recognized gender, no block can be chosen");
                report.no_rooms += 1;
                let mut ignored = 0;
                self.set_status(pool, index, AllocationStatus::NoRooms)
                    .await
                    .tally(&mut ignored, &mut report.inconsistencies);
                continue;
            };

            let choice =
                find_room_counted(gender, &self.policy, &pool.rooms, &counts).map(|c| c.assignment());
            let Some(assignment) = choice else {
                debug!(trainee = %trainee_id, gender = %gender, "No room available");
                report.no_rooms += 1;
                let mut ignored = 0;
                self.set_status(pool, index, AllocationStatus::NoRooms)
                    .await
                    .tally(&mut ignored, &mut report.inconsistencies);
                continue;
            };

            let mut patch = Patch::new().room(Some(&assignment));
            if status != Some(AllocationStatus::Allocated) {
                patch = patch.allocation_status(AllocationStatus::Allocated);
            }
            if !self.write(Collection::Trainees, &trainee_id, patch).await {
                report.inconsistencies += 1;
                continue;
            }

            let trainee = &mut pool.trainees[index];
            trainee.room = Some(assignment.room_ref());
            trainee.bed_space = Some(assignment.bed_space.clone());
            trainee.allocation_status = Some(AllocationStatus::Allocated);
            report.rooms_assigned += 1;
            debug!(
                trainee = %trainee_id,
                block = %assignment.room_block,
                room = %assignment.room_number,
                "Room assigned"
            );

            let room_ref = assignment.room_ref();
            for (room, count) in pool.rooms.iter().zip(counts.iter_mut()) {
                if same_room(&room_ref, &room.room_number, &room.block) {
                    *count += 1;
                }
            }
            self.refresh_rooms_matching(pool, &counts, &room_ref, report).await;
        }
    }

    // ------------------------------------------------------------------------
    // Single-trainee paths
    // ------------------------------------------------------------------------

    async fn claim_next_tag(&self) -> ReconcileResult<Option<String>> {
        let tags = self.reader.tags().await?;
        let trainees = self.reader.trainees().await?;

        let Some(tag) = next_unheld_tag(&tags, &trainees, &self.matcher) else {
            info!("Tag pool exhausted");
            return Ok(None);
        };
        self.patch_with_retry(
            Collection::Tags,
            &tag.id,
            Patch::new().tag_status(TagStatus::Assigned),
        )
        .await?;

        info!(tag = %tag.tag_no, "Tag claimed");
        Ok(Some(tag.tag_no.clone()))
    }

    /// Claim the next available tag and return its number
    ///
    /// Returns `None` when the pool is exhausted. The tag is marked
    /// `assigned` before it is returned.
    pub async fn allocate_tag_number(&self) -> ReconcileResult<Option<String>> {
        let _guard = self.pass_guard.lock().await;
        self.claim_next_tag().await
    }

    /// Find a room with a free bed for a gender without writing anything
    pub async fn allocate_room_with_bed_space(&self, gender: Gender) -> ReconcileResult<Option<RoomAssignment>> {
        let rooms = self.reader.rooms().await?;
        let trainees = self.reader.trainees().await?;
        Ok(find_room(gender, &self.policy, &rooms, &trainees).map(|c| c.assignment()))
    }

    /// Create a trainee and allocate a tag and room for it
    ///
    /// A room is only sought once a tag was obtained. Exhaustion is reported
    /// through [`Registration::status`], not as an error.
    pub async fn register_trainee(&self, trainee: NewTrainee) -> ReconcileResult<Registration> {
        let _guard = self.pass_guard.lock().await;
        let gender = trainee.gender;
        let doc = trainee.into_fields();

        let id = with_retry_if(
            &self.retry,
            || self.store.create_record(Collection::Trainees, doc.clone()),
            StoreError::is_recoverable,
        )
        .await?;
        info!(trainee = %id, gender = %gender, "Trainee registered");

        let tag_number = self.claim_next_tag().await?;
        let room = match tag_number {
            Some(_) => self.allocate_room_with_bed_space(gender).await?,
            None => None,
        };
        let status = match (&tag_number, &room) {
            (None, _) => AllocationStatus::NoTags,
            (Some(_), None) => AllocationStatus::NoRooms,
            (Some(_), Some(_)) => AllocationStatus::Allocated,
        };

        let patch = Patch::new()
            .tag_number(tag_number.as_deref())
            .room(room.as_ref())
            .allocation_status(status);
        self.patch_with_retry(Collection::Trainees, &id, patch).await?;

        if let Some(assignment) = &room {
            let mut pool = self.reader.load().await?;
            let counts = occupancy_counts(&pool.rooms, &pool.trainees);
            let mut report = SyncReport::new(Utc::now());
            self.refresh_rooms_matching(&mut pool, &counts, &assignment.room_ref(), &mut report)
                .await;
            if report.inconsistencies > 0 {
                warn!(trainee = %id, "Room status refresh failed after registration");
            }
        }

        info!(trainee = %id, status = %status, "Registration allocation finished");
        Ok(Registration {
            id,
            status,
            tag_number,
            room,
        })
    }
}
