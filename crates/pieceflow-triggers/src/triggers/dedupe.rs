//! Cursor discipline for polling triggers.
//!
//! Pure functions over one fetched page; the polling controller owns the
//! store reads and writes around them.

use crate::types::{DedupeStrategy, PolledItem, PollingCursor};

/// Items not seen before, and the cursor to persist afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupeOutcome {
    /// New items, oldest first.
    pub new_items: Vec<PolledItem>,
    /// `None` only when there was no cursor and the page was empty.
    pub cursor: Option<PollingCursor>,
}

/// Split a newest-first page into unseen items and the advanced cursor.
///
/// A cursor of the wrong kind for `strategy` is treated as absent, which
/// makes the whole page new.
pub fn dedupe(
    strategy: DedupeStrategy,
    mut items: Vec<PolledItem>,
    cursor: Option<&PollingCursor>,
) -> DedupeOutcome {
    match strategy {
        DedupeStrategy::LastItem => {
            let last_id = cursor.and_then(PollingCursor::last_item_id);
            let next = items
                .first()
                .map(|head| PollingCursor::last_item(head.id.clone()))
                .or_else(|| cursor.filter(|c| c.last_item_id().is_some()).cloned());

            let seen_at = last_id.and_then(|id| items.iter().position(|item| item.id == id));
            if let Some(pos) = seen_at {
                items.truncate(pos);
            }
            items.reverse();
            DedupeOutcome {
                new_items: items,
                cursor: next,
            }
        }
        DedupeStrategy::TimeBased => {
            let threshold = cursor.and_then(PollingCursor::epoch_ms);
            items.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));

            let head = items.first().map(|item| item.created_at_ms);
            let next = match (threshold, head) {
                (Some(t), Some(h)) => Some(t.max(h)),
                (t, h) => t.or(h),
            }
            .map(PollingCursor::time);

            if let Some(t) = threshold {
                items.retain(|item| item.created_at_ms > t);
            }
            items.reverse();
            DedupeOutcome {
                new_items: items,
                cursor: next,
            }
        }
    }
}

/// Cursor to persist when a trigger is enabled.
///
/// An empty page seeds a time cursor with `now_ms` so only later items are
/// emitted; a last-item cursor cannot be seeded without an item.
pub fn seed_cursor(
    strategy: DedupeStrategy,
    items: &[PolledItem],
    now_ms: i64,
) -> Option<PollingCursor> {
    match strategy {
        DedupeStrategy::LastItem => items
            .first()
            .map(|head| PollingCursor::last_item(head.id.clone())),
        DedupeStrategy::TimeBased => Some(PollingCursor::time(
            items
                .iter()
                .map(|item| item.created_at_ms)
                .max()
                .unwrap_or(now_ms),
        )),
    }
}
