//! Crossbeam-based memory reclamation for kelp collections.
//!
//! This crate provides [`EpochGuard`], an implementation of the
//! `kelp_core::Guard` trait on top of crossbeam-epoch.
//!
//! # Usage
//!
//! ```ignore
//! use kelp_core::SkipListSet;
//! use kelp_crossbeam::EpochGuard;
//!
//! let set: SkipListSet<i64, _, EpochGuard> = SkipListSet::new();
//! set.add(42);
//! ```

pub mod epoch_guard;

pub use epoch_guard::EpochGuard;
