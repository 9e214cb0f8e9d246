use rstest::rstest;
use serial_test::serial;

use kelp_core::common_tests::set_core_tests::*;
use kelp_core::common_tests::set_stress_tests::*;
use kelp_core::{Natural, SkipListSet};
use kelp_crossbeam::EpochGuard;

use std::sync::Arc;
use std::thread;

// ============================================================================
// Shared suites under epoch reclamation
// ============================================================================

#[test]
fn round_trip() {
    test_round_trip::<EpochGuard>();
}

#[test]
fn remove_absent() {
    test_remove_absent::<EpochGuard>();
}

#[test]
fn repeated_operations() {
    test_repeated_operations::<EpochGuard>();
}

#[test]
fn custom_ordering() {
    test_custom_ordering::<EpochGuard>();
}

#[test]
fn concurrent_distinct_inserts() {
    test_concurrent_distinct_inserts::<EpochGuard>();
}

#[rstest]
#[serial]
#[case::pair(2)]
#[case::eight(8)]
#[case::many(32)]
fn duplicate_insert_race(#[case] num_threads: usize) {
    test_duplicate_insert_race::<EpochGuard>(num_threads);
}

#[rstest]
#[serial]
#[case::pair(2)]
#[case::sixteen(16)]
#[case::many(64)]
fn contended_point_remove(#[case] num_threads: usize) {
    test_contended_point_remove::<EpochGuard>(num_threads);
}

#[test]
#[serial]
fn mixed_random_operations() {
    test_mixed_random_operations::<EpochGuard>(4, 25_000);
}

#[test]
#[serial]
fn churn_convergence() {
    test_churn_convergence::<EpochGuard>(2000);
}

#[test]
fn len_tracks_quiescent_population() {
    test_len_tracks_quiescent_population::<EpochGuard>();
}

#[test]
#[serial]
fn reads_during_modifications() {
    test_reads_during_modifications::<EpochGuard>();
}

#[test]
fn memory_ordering() {
    test_memory_ordering::<EpochGuard>();
}

#[test]
#[serial]
fn linearizability() {
    test_linearizability::<EpochGuard>();
}

#[test]
#[serial]
fn progress_guarantee() {
    test_progress_guarantee::<EpochGuard>();
}

#[test]
#[serial]
fn aba_churn() {
    test_aba_churn::<EpochGuard>();
}

// ============================================================================
// Epoch-specific behavior
// ============================================================================

/// Removed nodes are handed to the collector, re-adds allocate fresh ones,
/// and membership stays exact throughout.
#[test]
fn memory_reclamation_cycle() {
    let set: SkipListSet<i32, Natural, EpochGuard> = SkipListSet::new();

    for i in 0..1000 {
        set.add(i);
    }
    for i in (0..1000).step_by(2) {
        assert!(set.remove(&i));
    }
    for i in (0..1000).step_by(2) {
        assert!(!set.contains(&i));
    }
    for i in (1..1000).step_by(2) {
        assert!(set.contains(&i));
    }

    // Recycle the removed half a few times.
    for _ in 0..5 {
        for i in (0..1000).step_by(2) {
            assert!(set.add(i));
            assert!(set.remove(&i));
        }
    }

    assert_eq!(set.len(), 500);
    set.check_invariants();
}

/// Churn while one thread repeatedly forces collection cycles, so retired
/// nodes actually get freed mid-run; any premature reclamation shows up
/// under address-reuse pressure.
#[test]
#[serial]
fn churn_under_epoch_pressure() {
    use crossbeam_epoch as epoch;

    let set: Arc<SkipListSet<i64, Natural, EpochGuard>> = Arc::new(SkipListSet::new());
    let thread_count = 8;
    let ops_per_thread = 10_000;
    let key_range = 50i64;

    for i in 0..key_range {
        set.add(i);
    }

    let handles: Vec<_> = (0..thread_count)
        .map(|t| {
            let set = Arc::clone(&set);
            thread::spawn(move || {
                for i in 0..ops_per_thread {
                    let key = (i as i64) % key_range;
                    set.remove(&key);
                    set.add(key);

                    if t == 0 && i % 100 == 0 {
                        let guard = epoch::pin();
                        guard.flush();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    set.check_invariants();
    println!(
        "epoch pressure churn: final population {} of {}",
        set.len(),
        key_range
    );
}
