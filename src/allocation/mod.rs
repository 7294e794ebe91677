//! Pure allocation math
//!
//! Everything here works on explicit snapshots passed as arguments and has no
//! side effects, so the allocation rules are unit-testable without a store.
//! Reads and writes are isolated in [`crate::reconcile`].
//!
//! # Modules
//!
//! - [`matching`] - Correlation rules shared by every comparison
//! - [`occupancy`] - Bed occupancy and room status derivation
//! - [`tags`] - Next available tag selection
//! - [`rooms`] - Gender block policy and room selection

pub mod matching;
pub mod occupancy;
pub mod rooms;
pub mod tags;

pub use matching::{natural_cmp, occupies, room_key, same_room, TagMatcher, LEGACY_TAG_PREFIX};
pub use occupancy::{
    compute_occupancy, normalize_capacity, occupancy_counts, occupancy_with, status_for, target_status,
    Occupancy,
};
pub use rooms::{
    candidate_rooms, candidate_rooms_counted, find_room, find_room_counted, BlockPolicy, PolicyError,
    RoomCandidate,
};
pub use tags::{available_tags, next_available_tag, next_unheld_tag};
