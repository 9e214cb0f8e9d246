//! Deferred guard implementation for testing.

use parking_lot::Mutex;
#[cfg(debug_assertions)]
use std::collections::HashSet;

use super::Guard;

/// A guard that parks every retired node until the guard itself drops.
///
/// Since the guard is stored inside the collection, retired nodes stay
/// valid for the collection's whole lifetime — any stale traversal is
/// trivially safe, and destruction timing is deterministic. Memory grows
/// with the number of removals, so this is for tests and short-lived sets,
/// not long-running processes.
pub struct DeferredGuard {
    retired: Mutex<Vec<Retired>>,
    #[cfg(debug_assertions)]
    seen: Mutex<HashSet<usize>>,
}

struct Retired {
    ptr: *mut (),
    dealloc: unsafe fn(*mut ()),
}

// Retired only carries the pointer and its deallocation function; the
// Mutex provides the synchronization.
unsafe impl Send for Retired {}

impl DeferredGuard {
    pub fn new() -> Self {
        DeferredGuard {
            retired: Mutex::new(Vec::new()),
            #[cfg(debug_assertions)]
            seen: Mutex::new(HashSet::new()),
        }
    }
}

impl Default for DeferredGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DeferredGuard {
    fn drop(&mut self) {
        for node in self.retired.get_mut().drain(..) {
            unsafe {
                (node.dealloc)(node.ptr);
            }
        }
    }
}

impl Guard for DeferredGuard {
    // Protection is provided by the stored guard itself; per-operation
    // pinning is a no-op.
    type ReadGuard = ();

    fn pin() -> Self::ReadGuard {}

    unsafe fn defer_destroy<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N)) {
        #[cfg(debug_assertions)]
        {
            let mut seen = self.seen.lock();
            assert!(
                seen.insert(node as usize),
                "node {:#x} retired twice",
                node as usize
            );
        }

        let node = Retired {
            ptr: node as *mut (),
            dealloc: unsafe {
                std::mem::transmute::<unsafe fn(*mut N), unsafe fn(*mut ())>(dealloc)
            },
        };
        self.retired.lock().push(node);
    }
}
