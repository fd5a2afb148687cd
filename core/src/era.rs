//! Process-wide era (world age) counter.

use std::sync::atomic::{AtomicU64, Ordering};

/// Upper validity bound of an artifact that serves its signature permanently.
pub const ALL_FUTURE_ERAS: u64 = u64::MAX;

static CURRENT_ERA: AtomicU64 = AtomicU64::new(1);

#[inline]
pub fn current_era() -> u64 {
    CURRENT_ERA.load(Ordering::Acquire)
}

/// Advance the era and return the new value.
pub fn bump_era() -> u64 {
    CURRENT_ERA.fetch_add(1, Ordering::AcqRel) + 1
}
