//! Core data structures for trainee allocation
//!
//! Trainees, rooms and tags are stored as sibling documents correlated only
//! by value equality of denormalized fields. The literal `"pending"` sentinel
//! exists only at the storage boundary: decoding turns it (and empty strings,
//! nulls and absent fields) into `None`, and [`Patch`] writes it back.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::{Fields, Record};

/// Placeholder stored in place of an unassigned tag, room or bed-space
pub const PENDING: &str = "pending";

/// Stored field names
pub mod fields {
    pub const GENDER: &str = "gender";
    pub const TAG_NUMBER: &str = "tagNumber";
    pub const ROOM_NUMBER: &str = "roomNumber";
    pub const ROOM_BLOCK: &str = "roomBlock";
    pub const BED_SPACE: &str = "bedSpace";
    pub const ALLOCATION_STATUS: &str = "allocationStatus";

    pub const BLOCK: &str = "block";
    pub const STATUS: &str = "status";
    pub const CURRENT_OCCUPANCY: &str = "currentOccupancy";

    pub const TAG_NO: &str = "tagNo";

    /// Trainee allocation fields that registration initializes to pending
    pub const TRAINEE_SENTINEL_FIELDS: [&str; 4] = [TAG_NUMBER, ROOM_NUMBER, ROOM_BLOCK, BED_SPACE];
}

/// Normalize an enum label: lowercase, `-` and spaces become `_`
fn normalize_label(raw: &str) -> String {
    raw.trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

// ============================================================================
// Enumerations
// ============================================================================

/// Gender category used to select reserved room blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    pub fn all() -> [Gender; 2] {
        [Gender::Male, Gender::Female]
    }

    /// Parse a stored gender label
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_label(raw).as_str() {
            "male" | "m" => Some(Gender::Male),
            "female" | "f" => Some(Gender::Female),
            _ => None,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gender::parse(s).ok_or_else(|| format!("unknown gender '{s}' (expected male or female)"))
    }
}

/// Trainee allocation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    Pending,
    Allocated,
    NoRooms,
    NoTags,
}

impl AllocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationStatus::Pending => "pending",
            AllocationStatus::Allocated => "allocated",
            AllocationStatus::NoRooms => "no_rooms",
            AllocationStatus::NoTags => "no_tags",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_label(raw).as_str() {
            "pending" => Some(AllocationStatus::Pending),
            "allocated" => Some(AllocationStatus::Allocated),
            "no_rooms" | "no_room" => Some(AllocationStatus::NoRooms),
            "no_tags" | "no_tag" => Some(AllocationStatus::NoTags),
            _ => None,
        }
    }

    /// Status implied by which resources a trainee actually holds
    pub fn derive(has_tag: bool, has_room: bool) -> Self {
        match (has_tag, has_room) {
            (true, true) => AllocationStatus::Allocated,
            (false, true) => AllocationStatus::NoTags,
            (true, false) => AllocationStatus::NoRooms,
            (false, false) => AllocationStatus::Pending,
        }
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Room status label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Available,
    PartiallyOccupied,
    FullyOccupied,
    Maintenance,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Available => "available",
            RoomStatus::PartiallyOccupied => "partially_occupied",
            RoomStatus::FullyOccupied => "fully_occupied",
            RoomStatus::Maintenance => "maintenance",
        }
    }

    /// Parse a stored label; `occupied` and `fully_occupied` are the same state
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_label(raw).as_str() {
            "available" | "vacant" => Some(RoomStatus::Available),
            "partially_occupied" | "partial" => Some(RoomStatus::PartiallyOccupied),
            "fully_occupied" | "occupied" | "full" => Some(RoomStatus::FullyOccupied),
            "maintenance" => Some(RoomStatus::Maintenance),
            _ => None,
        }
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag status label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagStatus {
    Available,
    Assigned,
}

impl TagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagStatus::Available => "available",
            TagStatus::Assigned => "assigned",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_label(raw).as_str() {
            "available" => Some(TagStatus::Available),
            "assigned" => Some(TagStatus::Assigned),
            _ => None,
        }
    }
}

impl fmt::Display for TagStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Boundary Decoding
// ============================================================================

/// Decode a field to a real (non-sentinel) string
fn real_string(fields: &Fields, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(PENDING) {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_absent(fields: &Fields, key: &str) -> bool {
    matches!(fields.get(key), None | Some(Value::Null))
}

fn parsed<T>(fields: &Fields, key: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
    fields.get(key).and_then(Value::as_str).and_then(parse)
}

fn count_field(fields: &Fields, key: &str) -> Option<u32> {
    match fields.get(key)? {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ============================================================================
// Entities
// ============================================================================

/// Room identity as referenced from a trainee
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomRef {
    pub number: String,
    pub block: String,
}

/// Result of a successful room allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomAssignment {
    pub room_number: String,
    pub room_block: String,
    pub bed_space: String,
}

impl RoomAssignment {
    pub fn room_ref(&self) -> RoomRef {
        RoomRef {
            number: self.room_number.clone(),
            block: self.room_block.clone(),
        }
    }
}

/// Trainee allocation view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trainee {
    pub id: String,
    pub gender: Option<Gender>,
    pub tag_number: Option<String>,
    /// Set only when both room number and block are real values
    pub room: Option<RoomRef>,
    pub bed_space: Option<String>,
    /// `None` when the stored value is absent or unrecognized
    pub allocation_status: Option<AllocationStatus>,
    /// Allocation fields missing from the stored document
    pub missing_fields: Vec<&'static str>,
}

impl Trainee {
    pub fn from_record(record: &Record) -> Self {
        let f = &record.fields;
        let room = match (real_string(f, fields::ROOM_NUMBER), real_string(f, fields::ROOM_BLOCK)) {
            (Some(number), Some(block)) => Some(RoomRef { number, block }),
            _ => None,
        };
        let missing_fields = fields::TRAINEE_SENTINEL_FIELDS
            .into_iter()
            .filter(|key| is_absent(f, key))
            .collect();

        Self {
            id: record.id.clone(),
            gender: parsed(f, fields::GENDER, Gender::parse),
            tag_number: real_string(f, fields::TAG_NUMBER),
            room,
            bed_space: real_string(f, fields::BED_SPACE),
            allocation_status: parsed(f, fields::ALLOCATION_STATUS, AllocationStatus::parse),
            missing_fields,
        }
    }

    pub fn has_tag(&self) -> bool {
        self.tag_number.is_some()
    }

    pub fn has_room(&self) -> bool {
        self.room.is_some()
    }

    /// Status implied by the resources this trainee holds
    pub fn derived_status(&self) -> AllocationStatus {
        AllocationStatus::derive(self.has_tag(), self.has_room())
    }
}

/// Room allocation view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: String,
    pub room_number: String,
    /// Empty when the stored block is missing
    pub block: String,
    /// Raw capacity label (`"2"`, `"double"`, ...)
    pub bed_space: Option<String>,
    pub status: Option<RoomStatus>,
    pub current_occupancy: Option<u32>,
}

impl Room {
    /// Decode a room; `None` when the record has no room number
    pub fn from_record(record: &Record) -> Option<Self> {
        let f = &record.fields;
        Some(Self {
            id: record.id.clone(),
            room_number: real_string(f, fields::ROOM_NUMBER)?,
            block: real_string(f, fields::BLOCK).unwrap_or_default(),
            bed_space: real_string(f, fields::BED_SPACE),
            status: parsed(f, fields::STATUS, RoomStatus::parse),
            current_occupancy: count_field(f, fields::CURRENT_OCCUPANCY),
        })
    }

    pub fn is_under_maintenance(&self) -> bool {
        self.status == Some(RoomStatus::Maintenance)
    }
}

/// Identification tag view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: String,
    pub tag_no: String,
    pub status: Option<TagStatus>,
}

impl Tag {
    /// Decode a tag; `None` when the record has no tag number
    pub fn from_record(record: &Record) -> Option<Self> {
        let f = &record.fields;
        Some(Self {
            id: record.id.clone(),
            tag_no: real_string(f, fields::TAG_NO)?,
            status: parsed(f, fields::STATUS, TagStatus::parse),
        })
    }

    pub fn is_available(&self) -> bool {
        self.status == Some(TagStatus::Available)
    }
}

// ============================================================================
// Boundary Encoding
// ============================================================================

/// Partial update of one document, encoding `None` as the pending sentinel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    fields: Fields,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    fn sentinel(mut self, key: &str, value: Option<&str>) -> Self {
        let value = value.unwrap_or(PENDING);
        self.fields.insert(key.to_string(), Value::String(value.to_string()));
        self
    }

    /// Set an arbitrary field
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn tag_number(self, tag: Option<&str>) -> Self {
        self.sentinel(fields::TAG_NUMBER, tag)
    }

    /// Set or clear room number, block and bed-space together
    pub fn room(self, assignment: Option<&RoomAssignment>) -> Self {
        match assignment {
            Some(a) => self
                .sentinel(fields::ROOM_NUMBER, Some(&a.room_number))
                .sentinel(fields::ROOM_BLOCK, Some(&a.room_block))
                .sentinel(fields::BED_SPACE, Some(&a.bed_space)),
            None => self
                .sentinel(fields::ROOM_NUMBER, None)
                .sentinel(fields::ROOM_BLOCK, None)
                .sentinel(fields::BED_SPACE, None),
        }
    }

    /// Write the pending sentinel into a field
    pub fn pending(self, key: &str) -> Self {
        self.sentinel(key, None)
    }

    pub fn allocation_status(self, status: AllocationStatus) -> Self {
        self.set(fields::ALLOCATION_STATUS, status.as_str())
    }

    pub fn room_status(self, status: RoomStatus) -> Self {
        self.set(fields::STATUS, status.as_str())
    }

    pub fn current_occupancy(self, occupancy: u32) -> Self {
        self.set(fields::CURRENT_OCCUPANCY, occupancy)
    }

    pub fn tag_status(self, status: TagStatus) -> Self {
        self.set(fields::STATUS, status.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Compact `key=value` rendering for logs
    pub fn describe(&self) -> String {
        self.fields
            .iter()
            .map(|(key, value)| match value {
                Value::String(s) => format!("{key}={s}"),
                other => format!("{key}={other}"),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn into_fields(self) -> Fields {
        self.fields
    }
}
