//! Concurrent callers against the shared stores.

mod common;

use std::collections::HashSet;

use chrono::Duration;
use tokio::task::JoinSet;

use common::{jan_first_2024, Harness};
use domains::{ListingRepository, ListingStatus};
use services::{extract_counter_from_message_id, extract_date_from_message_id, EvaluationOutcome};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_allocations_are_unique_and_dense() {
    const CALLERS: usize = 200;
    let harness = Harness::new(jan_first_2024() + Duration::hours(12));

    let mut tasks = JoinSet::new();
    for _ in 0..CALLERS {
        let allocator = harness.message_ids.clone();
        tasks.spawn(async move { allocator.allocate().await });
    }
    let ids: Vec<String> = tasks.join_all().await;

    let distinct: HashSet<&String> = ids.iter().collect();
    assert_eq!(distinct.len(), CALLERS);

    let mut counters: Vec<u32> = ids
        .iter()
        .map(|id| extract_counter_from_message_id(id).unwrap())
        .collect();
    counters.sort_unstable();
    let expected: Vec<u32> = (1..=CALLERS as u32).collect();
    assert_eq!(counters, expected);

    for id in &ids {
        assert_eq!(
            extract_date_from_message_id(id),
            Some(jan_first_2024().date_naive())
        );
    }
    assert_eq!(harness.store.counter("20240101"), Some(CALLERS as u64));
}

#[tokio::test]
async fn test_sequential_allocations_increase_and_reset_per_day() {
    let harness = Harness::new(jan_first_2024());

    assert_eq!(harness.message_ids.allocate().await, "MSG202401010000001");
    assert_eq!(harness.message_ids.allocate().await, "MSG202401010000002");

    harness.clock.advance(Duration::days(1));
    assert_eq!(harness.message_ids.allocate().await, "MSG202401020000001");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_evaluations_archive_exactly_once() {
    const CALLERS: usize = 16;
    let harness = Harness::new(jan_first_2024() + Duration::hours(49));
    harness.add_listing("card-1", "seller", jan_first_2024());

    let mut tasks = JoinSet::new();
    for _ in 0..CALLERS {
        let lifecycle = harness.lifecycle.clone();
        tasks.spawn(async move { lifecycle.evaluate("card-1").await });
    }
    let outcomes: Vec<EvaluationOutcome> = tasks
        .join_all()
        .await
        .into_iter()
        .map(|result| result.unwrap())
        .collect();

    let archived = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, EvaluationOutcome::Archived { .. }))
        .count();
    let already = outcomes
        .iter()
        .filter(|outcome| **outcome == EvaluationOutcome::AlreadyArchived)
        .count();
    assert_eq!(archived, 1);
    assert_eq!(already, CALLERS - 1);

    let stored = harness.store.get_listing("card-1").await.unwrap().unwrap();
    assert_eq!(stored.status, ListingStatus::Archived);
    assert_eq!(stored.previous_status, Some(ListingStatus::Active));
}
