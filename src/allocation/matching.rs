//! Correlation rules between trainees, rooms and tags
//!
//! The three collections reference each other only by denormalized values.
//! Every comparison goes through this module so tolerant rules (trimming,
//! case folding, legacy tag prefixes) apply identically at every call site.

use std::cmp::Ordering;

use crate::models::{Room, RoomRef, Tag, Trainee};

/// Prefix carried by some legacy stored tag numbers
pub const LEGACY_TAG_PREFIX: &str = "Trainee-";

/// Case-insensitive equality after trimming
fn same_value(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Whether a room reference and a room number/block pair name the same room
pub fn same_room(room_ref: &RoomRef, room_number: &str, block: &str) -> bool {
    same_value(&room_ref.number, room_number) && same_value(&room_ref.block, block)
}

/// Normalized (number, block) key under which [`same_room`] agrees
pub fn room_key(room_number: &str, block: &str) -> (String, String) {
    (
        room_number.trim().to_ascii_lowercase(),
        block.trim().to_ascii_lowercase(),
    )
}

/// Whether a trainee currently occupies a room
pub fn occupies(trainee: &Trainee, room: &Room) -> bool {
    trainee
        .room
        .as_ref()
        .is_some_and(|r| same_room(r, &room.room_number, &room.block))
}

/// Whether two block labels are the same block
pub fn same_block(a: &str, b: &str) -> bool {
    same_value(a, b)
}

// ============================================================================
// Tag Matching
// ============================================================================

/// Tolerant tag-number comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMatcher {
    legacy_prefixes: Vec<String>,
}

impl TagMatcher {
    pub fn new<I, S>(legacy_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            legacy_prefixes: legacy_prefixes
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    pub fn legacy_prefixes(&self) -> &[String] {
        &self.legacy_prefixes
    }

    /// Tag number with surrounding whitespace and one legacy prefix removed
    pub fn canonical<'a>(&self, raw: &'a str) -> &'a str {
        let trimmed = raw.trim();
        for prefix in &self.legacy_prefixes {
            let matched = trimmed
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
            if matched {
                return trimmed[prefix.len()..].trim_start();
            }
        }
        trimmed
    }

    pub fn same_tag(&self, a: &str, b: &str) -> bool {
        self.canonical(a).eq_ignore_ascii_case(self.canonical(b))
    }

    /// Whether a trainee holds the given tag
    pub fn holds(&self, trainee: &Trainee, tag: &Tag) -> bool {
        trainee
            .tag_number
            .as_deref()
            .is_some_and(|held| self.same_tag(held, &tag.tag_no))
    }
}

impl Default for TagMatcher {
    fn default() -> Self {
        Self::new([LEGACY_TAG_PREFIX])
    }
}

// ============================================================================
// Ordering
// ============================================================================

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Natural ordering: digit runs compare numerically, so `T2 < T10`
///
/// Values equal under that rule (`T01` and `T1`) fall back to byte order
/// to keep the ordering total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => break,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ord = compare_digit_runs(&take_digits(&mut left), &take_digits(&mut right));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(l), Some(r)) => {
                let ord = l.to_ascii_lowercase().cmp(&r.to_ascii_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                left.next();
                right.next();
            }
        }
    }

    a.cmp(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trainee_in(number: &str, block: &str) -> Trainee {
        Trainee {
            id: "tr".into(),
            gender: None,
            tag_number: None,
            room: Some(RoomRef {
                number: number.into(),
                block: block.into(),
            }),
            bed_space: None,
            allocation_status: None,
            missing_fields: Vec::new(),
        }
    }

    fn room(number: &str, block: &str) -> Room {
        Room {
            id: "r".into(),
            room_number: number.into(),
            block: block.into(),
            bed_space: None,
            status: None,
            current_occupancy: None,
        }
    }

    #[test]
    fn test_occupies_requires_both_fields() {
        assert!(occupies(&trainee_in("101", "A"), &room("101", "A")));
        assert!(occupies(&trainee_in(" 101", "a"), &room("101", "A ")));
        assert!(!occupies(&trainee_in("101", "B"), &room("101", "A")));
        assert!(!occupies(&trainee_in("102", "A"), &room("101", "A")));
    }

    #[test]
    fn test_canonical_strips_legacy_prefix() {
        let matcher = TagMatcher::default();
        assert_eq!(matcher.canonical("Trainee-T7"), "T7");
        assert_eq!(matcher.canonical("trainee-T7"), "T7");
        assert_eq!(matcher.canonical(" T7 "), "T7");
        assert_eq!(matcher.canonical("Tr"), "Tr");
    }

    #[test]
    fn test_same_tag_tolerates_prefix_both_sides() {
        let matcher = TagMatcher::default();
        assert!(matcher.same_tag("Trainee-T7", "T7"));
        assert!(matcher.same_tag("T7", "Trainee-T7"));
        assert!(matcher.same_tag("t7", "T7"));
        assert!(!matcher.same_tag("T7", "T70"));
    }

    #[test]
    fn test_matcher_without_prefixes() {
        let matcher = TagMatcher::new(Vec::<String>::new());
        assert!(!matcher.same_tag("Trainee-T7", "T7"));
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("T2", "T10"), Ordering::Less);
        assert_eq!(natural_cmp("T10", "T9"), Ordering::Greater);
        assert_eq!(natural_cmp("A-101", "A-101"), Ordering::Equal);
        assert_eq!(natural_cmp("101", "B1"), Ordering::Less);
        assert_eq!(natural_cmp("T1", "T1a"), Ordering::Less);
        assert_ne!(natural_cmp("T01", "T1"), Ordering::Equal);
    }

    #[test]
    fn test_natural_sort() {
        let mut tags = vec!["T10", "T2", "T1", "t3"];
        tags.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(tags, vec!["T1", "T2", "t3", "T10"]);
    }
}
