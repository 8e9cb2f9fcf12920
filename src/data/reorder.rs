//! Drag-gesture index translation.
//!
//! Turns "the element at slot `from` should end up at slot `to`" into a move
//! on the authoritative list. Pure sequence transformations, no I/O; the list
//! controllers call these on every drag step and send the final order once
//! the drag ends.

/// Number of leading category slots ("All" and "Bookmarked") that never move.
pub const PINNED_CATEGORY_SLOTS: usize = 2;

/// Remove the element at `from` and reinsert it at `to`, shifting the
/// elements in between by one.
///
/// Returns `false` without touching the list when `from == to` or either
/// index is out of range.
pub fn move_item<T>(list: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from == to || from >= list.len() || to >= list.len() {
        return false;
    }
    let element = list.remove(from);
    list.insert(to, element);
    true
}

/// Like [`move_item`], but both endpoints must lie below `limit`.
///
/// Today's list uses this to keep drags inside the incomplete section.
pub fn move_within<T>(list: &mut Vec<T>, from: usize, to: usize, limit: usize) -> bool {
    if from >= limit || to >= limit {
        return false;
    }
    move_item(list, from, to)
}

/// Move within a category list. Any request naming a pinned slot as source or
/// destination is rejected.
pub fn move_category<T>(list: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from < PINNED_CATEGORY_SLOTS || to < PINNED_CATEGORY_SLOTS {
        return false;
    }
    move_item(list, from, to)
}
