//! Guard trait for memory reclamation strategies.
//!
//! A lock-free remove only *logically* deletes a node; the node is
//! physically unlinked by later traversals and may still be referenced by
//! threads that loaded a pointer to it before the unlink. Something has to
//! delay the actual `dealloc` until no such reference can exist. That
//! something is the guard:
//!
//! ```text
//! SkipListSet<T, O, G: Guard>
//!     │
//!     ├── SkipListSet<T, O, EpochGuard>      (production, kelp-crossbeam)
//!     └── SkipListSet<T, O, DeferredGuard>   (testing, this crate)
//! ```
//!
//! # Safety contract
//!
//! Implementations must ensure a node passed to `defer_destroy` is not
//! freed while any thread holding a `ReadGuard` pinned before the call can
//! still dereference it. Callers must only retire nodes that are already
//! unreachable from the structure.

mod deferred_guard;

pub use deferred_guard::DeferredGuard;

/// A memory reclamation strategy.
///
/// The guard stored in a collection schedules deferred destruction; actual
/// read protection (epoch pinning, for strategies that need it) happens
/// per-operation via [`Guard::pin`].
pub trait Guard: Default + Send + Sync {
    /// An active guard protecting reads for its lifetime.
    ///
    /// Epoch-based guards hold a pinned `crossbeam_epoch::Guard` here; the
    /// deferred guard uses `()` since nothing is freed before the
    /// collection drops.
    type ReadGuard: Sized;

    /// Pin a read guard for the duration of one operation.
    fn pin() -> Self::ReadGuard;

    /// Schedule a node for destruction once no reader can hold it.
    ///
    /// # Safety
    ///
    /// - `node` must have been allocated by the collection that retires it,
    ///   and `dealloc` must be the matching deallocation function
    /// - `node` must already be unreachable by traversal from the
    ///   collection's roots
    /// - `node` must be retired at most once
    unsafe fn defer_destroy<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N));
}
