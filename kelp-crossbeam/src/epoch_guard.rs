//! Epoch-based guard implementation using crossbeam-epoch.

use crossbeam_epoch::{self as epoch, Guard as CrossbeamGuard};
use kelp_core::Guard;

/// Epoch-based memory reclamation.
///
/// A zero-sized guard: all state lives in crossbeam's global epoch
/// collector, so it can be stored inside a collection without affecting
/// `Send`/`Sync`. Each operation pins the current thread for its duration;
/// a retired node's destructor runs only after every thread pinned at
/// retirement time has unpinned, which is exactly the window in which a
/// stale traversal could still dereference it.
///
/// Reclamation is batched and amortized O(1) per node; memory may
/// accumulate while threads stay pinned for long stretches.
#[derive(Clone, Copy, Default)]
pub struct EpochGuard;

impl EpochGuard {
    pub fn new() -> Self {
        EpochGuard
    }
}

impl Guard for EpochGuard {
    /// A pinned crossbeam guard; dropping it unpins the thread.
    type ReadGuard = CrossbeamGuard;

    fn pin() -> Self::ReadGuard {
        epoch::pin()
    }

    unsafe fn defer_destroy<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N)) {
        // Pin, schedule the destructor to run once all currently pinned
        // threads have advanced, and unpin on return.
        let guard = epoch::pin();
        unsafe {
            guard.defer_unchecked(move || {
                dealloc(node);
            });
        }
    }
}
