use rstest::rstest;

use kelp_core::common_tests::set_core_tests::*;
use kelp_core::DeferredGuard;

#[test]
fn round_trip() {
    test_round_trip::<DeferredGuard>();
}

#[test]
fn remove_absent() {
    test_remove_absent::<DeferredGuard>();
}

#[test]
fn repeated_operations() {
    test_repeated_operations::<DeferredGuard>();
}

#[test]
fn custom_ordering() {
    test_custom_ordering::<DeferredGuard>();
}

#[test]
fn concurrent_distinct_inserts() {
    test_concurrent_distinct_inserts::<DeferredGuard>();
}

#[rstest]
#[case::pair(2)]
#[case::eight(8)]
#[case::many(32)]
fn duplicate_insert_race(#[case] num_threads: usize) {
    test_duplicate_insert_race::<DeferredGuard>(num_threads);
}

#[rstest]
#[case::pair(2)]
#[case::sixteen(16)]
#[case::many(64)]
fn contended_point_remove(#[case] num_threads: usize) {
    test_contended_point_remove::<DeferredGuard>(num_threads);
}

#[test]
fn mixed_random_operations() {
    test_mixed_random_operations::<DeferredGuard>(4, 25_000);
}

#[test]
fn churn_convergence() {
    test_churn_convergence::<DeferredGuard>(2000);
}

#[test]
fn len_tracks_quiescent_population() {
    test_len_tracks_quiescent_population::<DeferredGuard>();
}
