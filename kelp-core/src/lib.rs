//! A concurrent ordered set backed by a lock-free skip list.
//!
//! # Organization
//!
//! - [`skip_list`] - The set itself: [`SkipListSet`]
//! - [`order`] - Caller-supplied orderings ([`Order`], [`Natural`], closures)
//! - [`guard`] - Memory reclamation strategies ([`Guard`], [`DeferredGuard`])
//! - `internal` - Tagged-pointer plumbing (pub(crate))
//!
//! # Usage
//!
//! The set is generic over the ordering `O: Order<T>` and the reclamation
//! guard `G: Guard`:
//!
//! ```ignore
//! use kelp_core::{DeferredGuard, SkipListSet};
//!
//! let set: SkipListSet<i32, _, DeferredGuard> = SkipListSet::new();
//! assert!(set.add(42));
//! assert!(set.contains(&42));
//! assert!(set.remove(&42));
//! ```
//!
//! Production deployments plug in epoch-based reclamation from the
//! `kelp-crossbeam` crate instead of `DeferredGuard`.

pub mod common_tests;
pub mod guard;
pub mod order;
pub mod skip_list;

pub(crate) mod internal;

// Re-exports for convenience
pub use guard::{DeferredGuard, Guard};
pub use order::{Natural, Order};
pub use skip_list::SkipListSet;
