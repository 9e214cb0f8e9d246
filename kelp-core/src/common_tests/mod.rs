//! Test suites shared by every `Guard` implementation.
//!
//! The set's concurrent behavior must not depend on the reclamation
//! strategy, so the same batteries run under `DeferredGuard` (this crate's
//! tests) and `EpochGuard` (kelp-crossbeam's tests). Core tests cover the
//! sequential contract and the contended end-to-end scenarios; stress
//! tests are wall-clock-bound and belong behind `serial_test`.
