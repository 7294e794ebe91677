//! Occupancy calculator
//!
//! Pure functions deriving a room's bed occupancy and status label from the
//! trainee snapshot. Stored `status`/`currentOccupancy` values are never
//! trusted; callers persist the computed values when they differ.

use serde::Serialize;

use std::collections::HashMap;

use super::matching::{occupies, room_key};
use crate::models::{Room, RoomStatus, Trainee};

/// Capacity used when the stored bed-space is empty or unparseable
pub const DEFAULT_CAPACITY: u32 = 1;

/// Normalize a bed-space label to an integer capacity
///
/// Accepts `"single"`, `"double"` and integers. A room stored with `"0"` beds
/// has capacity 0 and is always full. Anything else falls back to
/// [`DEFAULT_CAPACITY`].
pub fn normalize_capacity(raw: Option<&str>) -> u32 {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return DEFAULT_CAPACITY;
    };

    match raw.to_ascii_lowercase().as_str() {
        "single" => 1,
        "double" => 2,
        other => other
            .parse::<u32>()
            .unwrap_or(DEFAULT_CAPACITY),
    }
}

/// Status label for a capacity/occupancy pair
pub fn status_for(capacity: u32, occupancy: u32) -> RoomStatus {
    if occupancy >= capacity {
        RoomStatus::FullyOccupied
    } else if occupancy > 0 {
        RoomStatus::PartiallyOccupied
    } else {
        RoomStatus::Available
    }
}

/// Computed occupancy of one room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Occupancy {
    pub capacity: u32,
    pub occupancy: u32,
    pub status: RoomStatus,
}

impl Occupancy {
    pub fn has_free_bed(&self) -> bool {
        self.occupancy < self.capacity
    }

    pub fn free_beds(&self) -> u32 {
        self.capacity.saturating_sub(self.occupancy)
    }
}

/// Count a room's occupants and derive its status
pub fn compute_occupancy(room: &Room, trainees: &[Trainee]) -> Occupancy {
    let occupancy = trainees.iter().filter(|t| occupies(t, room)).count();
    occupancy_with(room, u32::try_from(occupancy).unwrap_or(u32::MAX))
}

/// Occupancy of a room whose occupants were already counted
pub fn occupancy_with(room: &Room, occupancy: u32) -> Occupancy {
    let capacity = normalize_capacity(room.bed_space.as_deref());
    Occupancy {
        capacity,
        occupancy,
        status: status_for(capacity, occupancy),
    }
}

/// Occupant count of every room, indexed like `rooms`
///
/// One pass over the trainees; equivalent to calling [`compute_occupancy`]
/// for each room.
pub fn occupancy_counts(rooms: &[Room], trainees: &[Trainee]) -> Vec<u32> {
    let mut per_room: HashMap<(String, String), u32> = HashMap::new();
    for room_ref in trainees.iter().filter_map(|t| t.room.as_ref()) {
        *per_room.entry(room_key(&room_ref.number, &room_ref.block)).or_default() += 1;
    }
    rooms
        .iter()
        .map(|room| {
            per_room
                .get(&room_key(&room.room_number, &room.block))
                .copied()
                .unwrap_or(0)
        })
        .collect()
}

/// Status the reconciliation pass should store for a room
///
/// Rooms an operator put under maintenance keep that label.
pub fn target_status(room: &Room, occupancy: &Occupancy) -> RoomStatus {
    if room.is_under_maintenance() {
        RoomStatus::Maintenance
    } else {
        occupancy.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RoomRef;
    use proptest::prelude::*;

    fn room(number: &str, block: &str, bed_space: Option<&str>) -> Room {
        Room {
            id: format!("{block}-{number}"),
            room_number: number.into(),
            block: block.into(),
            bed_space: bed_space.map(String::from),
            status: None,
            current_occupancy: None,
        }
    }

    fn trainee(id: usize, room: Option<(&str, &str)>) -> Trainee {
        Trainee {
            id: format!("tr{id}"),
            gender: None,
            tag_number: None,
            room: room.map(|(number, block)| RoomRef {
                number: number.into(),
                block: block.into(),
            }),
            bed_space: None,
            allocation_status: None,
            missing_fields: Vec::new(),
        }
    }

    #[test]
    fn test_normalize_capacity() {
        assert_eq!(normalize_capacity(Some("single")), 1);
        assert_eq!(normalize_capacity(Some("Double")), 2);
        assert_eq!(normalize_capacity(Some(" 4 ")), 4);
        assert_eq!(normalize_capacity(Some("")), 1);
        assert_eq!(normalize_capacity(Some("bunk")), 1);
        assert_eq!(normalize_capacity(Some("0")), 0);
        assert_eq!(normalize_capacity(None), 1);
    }

    #[test]
    fn test_single_room_with_one_occupant_is_full() {
        let r = room("101", "A", Some("single"));
        let trainees = vec![trainee(1, Some(("101", "A")))];
        let occ = compute_occupancy(&r, &trainees);
        assert_eq!(occ.occupancy, 1);
        assert_eq!(occ.status, RoomStatus::FullyOccupied);
        assert!(!occ.has_free_bed());
    }

    #[test]
    fn test_double_room_transitions() {
        let r = room("102", "A", Some("double"));

        let empty = compute_occupancy(&r, &[]);
        assert_eq!(empty.status, RoomStatus::Available);

        let one = vec![trainee(1, Some(("102", "A")))];
        assert_eq!(compute_occupancy(&r, &one).status, RoomStatus::PartiallyOccupied);

        let two = vec![trainee(1, Some(("102", "A"))), trainee(2, Some(("102", "A")))];
        let occ = compute_occupancy(&r, &two);
        assert_eq!(occ.status, RoomStatus::FullyOccupied);
        assert_eq!(occ.free_beds(), 0);
    }

    #[test]
    fn test_large_room_statuses() {
        assert_eq!(status_for(4, 0), RoomStatus::Available);
        assert_eq!(status_for(4, 3), RoomStatus::PartiallyOccupied);
        assert_eq!(status_for(4, 4), RoomStatus::FullyOccupied);
        assert_eq!(status_for(4, 6), RoomStatus::FullyOccupied);
        assert_eq!(status_for(0, 0), RoomStatus::FullyOccupied);
    }

    #[test]
    fn test_same_number_other_block_not_counted() {
        let r = room("101", "A", Some("2"));
        let trainees = vec![trainee(1, Some(("101", "B"))), trainee(2, None)];
        assert_eq!(compute_occupancy(&r, &trainees).occupancy, 0);
    }

    #[test]
    fn test_occupancy_counts_match_per_room_count() {
        let rooms = vec![
            room("101", "A", Some("2")),
            room("101", "B", Some("2")),
            room("102", "a", Some("single")),
        ];
        let trainees = vec![
            trainee(1, Some(("101", "A"))),
            trainee(2, Some((" 101 ", "a"))),
            trainee(3, Some(("102", "A"))),
            trainee(4, None),
        ];
        let counts = occupancy_counts(&rooms, &trainees);
        assert_eq!(counts, vec![2, 0, 1]);
        for (room, count) in rooms.iter().zip(&counts) {
            assert_eq!(compute_occupancy(room, &trainees).occupancy, *count);
        }
    }

    #[test]
    fn test_maintenance_status_preserved() {
        let mut r = room("101", "A", Some("2"));
        r.status = Some(RoomStatus::Maintenance);
        let occ = compute_occupancy(&r, &[trainee(1, Some(("101", "A")))]);
        assert_eq!(target_status(&r, &occ), RoomStatus::Maintenance);
        assert_eq!(occ.occupancy, 1);
    }

    proptest! {
        #[test]
        fn prop_occupancy_is_exact_count(
            placements in proptest::collection::vec(
                proptest::option::of((0u8..4, prop::sample::select(vec!["A", "B"]))),
                0..40,
            ),
            target_number in 0u8..4,
            target_block in prop::sample::select(vec!["A", "B"]),
            capacity in 1u32..5,
        ) {
            let number = target_number.to_string();
            let r = room(&number, target_block, Some(capacity.to_string().as_str()));
            let trainees: Vec<Trainee> = placements
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    let owned = p.map(|(n, b)| (n.to_string(), b));
                    trainee(i, owned.as_ref().map(|(n, b)| (n.as_str(), *b)))
                })
                .collect();

            let expected = placements
                .iter()
                .filter(|p| matches!(p, Some((n, b)) if *n == target_number && *b == target_block))
                .count() as u32;

            let occ = compute_occupancy(&r, &trainees);
            prop_assert_eq!(occ.occupancy, expected);
            prop_assert_eq!(occ.status, status_for(capacity, expected));
        }
    }
}
