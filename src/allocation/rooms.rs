//! Room allocator
//!
//! Maps a gender to its reserved blocks and picks the first room in those
//! blocks with a free bed. Candidates are ordered by the block's position in
//! the configured list, then by room number in natural order, then by
//! record id, so the choice never depends on store listing order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::matching::{natural_cmp, same_block};
use super::occupancy::{occupancy_counts, occupancy_with, Occupancy};
use crate::models::{Gender, Room, RoomAssignment, Trainee};

// ============================================================================
// Block Policy
// ============================================================================

/// Invalid block reservation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("no blocks reserved for {0}")]
    NoBlocks(Gender),

    #[error("block '{0}' is reserved for more than one gender")]
    SharedBlock(String),
}

/// Blocks reserved for each gender, in preference order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPolicy {
    blocks: BTreeMap<Gender, Vec<String>>,
}

impl BlockPolicy {
    pub fn new<M, F>(male: impl IntoIterator<Item = M>, female: impl IntoIterator<Item = F>) -> Self
    where
        M: Into<String>,
        F: Into<String>,
    {
        Self::default()
            .with_blocks(Gender::Male, male)
            .with_blocks(Gender::Female, female)
    }

    /// Replace the reserved blocks of one gender
    pub fn with_blocks<S: Into<String>>(mut self, gender: Gender, blocks: impl IntoIterator<Item = S>) -> Self {
        let blocks = blocks
            .into_iter()
            .map(|b| {
                let block: String = b.into();
                block.trim().to_string()
            })
            .filter(|b| !b.is_empty())
            .collect();
        self.blocks.insert(gender, blocks);
        self
    }

    pub fn blocks_for(&self, gender: Gender) -> &[String] {
        self.blocks.get(&gender).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Position of a block in a gender's preference list
    pub fn block_rank(&self, gender: Gender, block: &str) -> Option<usize> {
        self.blocks_for(gender)
            .iter()
            .position(|reserved| same_block(reserved, block))
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        for gender in Gender::all() {
            if self.blocks_for(gender).is_empty() {
                return Err(PolicyError::NoBlocks(gender));
            }
        }
        for block in self.blocks_for(Gender::Male) {
            if self.block_rank(Gender::Female, block).is_some() {
                return Err(PolicyError::SharedBlock(block.clone()));
            }
        }
        Ok(())
    }
}

impl Default for BlockPolicy {
    /// Male trainees in blocks A and B, female trainees in C and D
    fn default() -> Self {
        let mut blocks = BTreeMap::new();
        blocks.insert(Gender::Male, vec!["A".to_string(), "B".to_string()]);
        blocks.insert(Gender::Female, vec!["C".to_string(), "D".to_string()]);
        Self { blocks }
    }
}

// ============================================================================
// Allocation
// ============================================================================

/// A room with at least one free bed
#[derive(Debug, Clone, Copy)]
pub struct RoomCandidate<'a> {
    /// Position of the room in the snapshot it was chosen from
    pub index: usize,
    pub room: &'a Room,
    pub occupancy: Occupancy,
    rank: usize,
}

impl RoomCandidate<'_> {
    /// Fields written to the trainee who takes this room
    pub fn assignment(&self) -> RoomAssignment {
        RoomAssignment {
            room_number: self.room.room_number.clone(),
            room_block: self.room.block.clone(),
            bed_space: self
                .room
                .bed_space
                .clone()
                .unwrap_or_else(|| self.occupancy.capacity.to_string()),
        }
    }
}

/// All rooms with a free bed for a gender, in allocation order
pub fn candidate_rooms<'a>(
    gender: Gender,
    policy: &BlockPolicy,
    rooms: &'a [Room],
    trainees: &[Trainee],
) -> Vec<RoomCandidate<'a>> {
    candidate_rooms_counted(gender, policy, rooms, &occupancy_counts(rooms, trainees))
}

/// Like [`candidate_rooms`], with occupant counts indexed like `rooms`
pub fn candidate_rooms_counted<'a>(
    gender: Gender,
    policy: &BlockPolicy,
    rooms: &'a [Room],
    counts: &[u32],
) -> Vec<RoomCandidate<'a>> {
    let mut candidates: Vec<RoomCandidate<'a>> = rooms
        .iter()
        .zip(counts)
        .enumerate()
        .filter(|(_, (room, _))| !room.is_under_maintenance())
        .filter_map(|(index, (room, count))| {
            let rank = policy.block_rank(gender, &room.block)?;
            let occupancy = occupancy_with(room, *count);
            occupancy.has_free_bed().then_some(RoomCandidate {
                index,
                room,
                occupancy,
                rank,
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        a.rank
            .cmp(&b.rank)
            .then_with(|| natural_cmp(&a.room.room_number, &b.room.room_number))
            .then_with(|| a.room.id.cmp(&b.room.id))
    });
    candidates
}

/// First room with a free bed for a gender, or `None` when none is left
pub fn find_room<'a>(
    gender: Gender,
    policy: &BlockPolicy,
    rooms: &'a [Room],
    trainees: &[Trainee],
) -> Option<RoomCandidate<'a>> {
    candidate_rooms(gender, policy, rooms, trainees).into_iter().next()
}

/// Like [`find_room`], with occupant counts indexed like `rooms`
pub fn find_room_counted<'a>(
    gender: Gender,
    policy: &BlockPolicy,
    rooms: &'a [Room],
    counts: &[u32],
) -> Option<RoomCandidate<'a>> {
    candidate_rooms_counted(gender, policy, rooms, counts).into_iter().next()
}
