//! Log context collection
//!
//! A library has no timer or task of its own, so each entry is stamped
//! with a process-wide monotonic counter instead of a hardware time.

use core::sync::atomic::{AtomicUsize, Ordering};

static NEXT_STAMP: AtomicUsize = AtomicUsize::new(1);

/// Returns the stamp for a new log entry
pub(super) fn next_stamp() -> usize {
    NEXT_STAMP.fetch_add(1, Ordering::Relaxed)
}
