//! Tag allocator
//!
//! Picks the next available identification tag from a snapshot. Selection is
//! deterministic regardless of store listing order: the smallest `tagNo` in
//! natural order wins, ties broken by record id.

use super::matching::{natural_cmp, TagMatcher};
use crate::models::{Tag, Trainee};

/// Tags currently marked available, in allocation order
pub fn available_tags(tags: &[Tag]) -> Vec<&Tag> {
    let mut available: Vec<&Tag> = tags.iter().filter(|t| t.is_available()).collect();
    available.sort_by(|a, b| natural_cmp(&a.tag_no, &b.tag_no).then_with(|| a.id.cmp(&b.id)));
    available
}

/// Next tag to hand out, or `None` when the pool is exhausted
pub fn next_available_tag(tags: &[Tag]) -> Option<&Tag> {
    available_tags(tags).into_iter().next()
}

/// Next available tag that no trainee already holds
///
/// A tag can be stored `available` while still referenced (drift, or a
/// failed status write earlier in the pass). Skipping held tags keeps tag
/// numbers unique across trainees.
pub fn next_unheld_tag<'a>(tags: &'a [Tag], trainees: &[Trainee], matcher: &TagMatcher) -> Option<&'a Tag> {
    available_tags(tags)
        .into_iter()
        .find(|tag| !trainees.iter().any(|t| matcher.holds(t, tag)))
}
