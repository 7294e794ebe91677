//! Resource pool reader
//!
//! Loads the three collections and decodes them into allocation views.
//! Records that cannot serve as a room or tag (no room number, no tag
//! number) are skipped and counted rather than failing the snapshot.

use tracing::{debug, warn};

use super::report::SyncSummary;
use super::{ReconcileError, ReconcileResult};
use crate::models::{Room, Tag, Trainee};
use crate::storage::{Collection, Record, SharedStore};

/// Decoded state of all three collections at one point in time
#[derive(Debug, Clone, Default)]
pub struct PoolSnapshot {
    pub trainees: Vec<Trainee>,
    pub rooms: Vec<Room>,
    pub tags: Vec<Tag>,
    /// Room and tag records skipped during decoding
    pub skipped: usize,
}

impl PoolSnapshot {
    pub fn from_records(trainees: &[Record], rooms: &[Record], tags: &[Record]) -> Self {
        let decoded_rooms: Vec<Room> = rooms.iter().filter_map(Room::from_record).collect();
        let decoded_tags: Vec<Tag> = tags.iter().filter_map(Tag::from_record).collect();
        let skipped = (rooms.len() - decoded_rooms.len()) + (tags.len() - decoded_tags.len());

        Self {
            trainees: trainees.iter().map(Trainee::from_record).collect(),
            rooms: decoded_rooms,
            tags: decoded_tags,
            skipped,
        }
    }

    pub fn summarize(&self) -> SyncSummary {
        SyncSummary::tally(&self.trainees, &self.rooms, &self.tags)
    }
}

/// Reads collection snapshots from a store
#[derive(Clone)]
pub struct PoolReader {
    store: SharedStore,
}

impl PoolReader {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Raw records of one collection
    pub async fn records(&self, collection: Collection) -> ReconcileResult<Vec<Record>> {
        self.store
            .list_all(collection)
            .await
            .map_err(|source| ReconcileError::Snapshot { collection, source })
    }

    pub async fn trainees(&self) -> ReconcileResult<Vec<Trainee>> {
        let records = self.records(Collection::Trainees).await?;
        Ok(records.iter().map(Trainee::from_record).collect())
    }

    pub async fn rooms(&self) -> ReconcileResult<Vec<Room>> {
        let records = self.records(Collection::Rooms).await?;
        Ok(records.iter().filter_map(Room::from_record).collect())
    }

    pub async fn tags(&self) -> ReconcileResult<Vec<Tag>> {
        let records = self.records(Collection::Tags).await?;
        Ok(records.iter().filter_map(Tag::from_record).collect())
    }

    /// Load a full snapshot of all three collections
    pub async fn load(&self) -> ReconcileResult<PoolSnapshot> {
        let trainees = self.records(Collection::Trainees).await?;
        let rooms = self.records(Collection::Rooms).await?;
        let tags = self.records(Collection::Tags).await?;

        let snapshot = PoolSnapshot::from_records(&trainees, &rooms, &tags);
        if snapshot.skipped > 0 {
            warn!(
                skipped = snapshot.skipped,
                "Skipped room/tag records without a room or tag number"
            );
        }
        debug!(
            trainees = snapshot.trainees.len(),
            rooms = snapshot.rooms.len(),
            tags = snapshot.tags.len(),
            "Loaded pool snapshot"
        );
        Ok(snapshot)
    }
}
