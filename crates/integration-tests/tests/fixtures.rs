//! A seeded store evaluated as a cron sweep would.

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Duration;

use common::jan_first_2024;
use domains::{Clock, ListingRepository, ListingStatus, ManualClock};
use services::{EvaluationOutcome, ListingLifecycleService, MalformedCreatedAtPolicy};
use storage_adapters::{Fixture, InMemoryDocumentStore};

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/marketplace.json")
}

async fn seeded(policy: MalformedCreatedAtPolicy) -> (Arc<InMemoryDocumentStore>, ListingLifecycleService) {
    let fixture = Fixture::load(&fixture_path()).await.unwrap();
    let store = Arc::new(InMemoryDocumentStore::from_fixture(fixture));
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(jan_first_2024() + Duration::hours(49)));
    let service = ListingLifecycleService::new(store.clone(), store.clone(), clock)
        .with_malformed_created_at(policy);
    (store, service)
}

#[tokio::test]
async fn test_sweep_over_fixture_flags_corrupt_records() {
    let (store, service) = seeded(MalformedCreatedAtPolicy::Flag).await;

    let summary = service.sweep(100).await.unwrap();
    assert_eq!(summary.evaluated, 4);
    // Premium listing stays; free and explicit-expiry listings archive.
    assert_eq!(summary.active, 1);
    assert_eq!(summary.archived, 2);
    assert_eq!(summary.warnings, 1);
    assert_eq!(summary.errors, 0);

    let corrupt = store.get_listing("broken-date").await.unwrap().unwrap();
    assert_eq!(corrupt.status, ListingStatus::Active);
    assert_eq!(
        store.list_listing_ids(ListingStatus::Archived, None, 10).await.unwrap(),
        vec!["onix-promo".to_string(), "starmie-holo".to_string()]
    );
}

#[tokio::test]
async fn test_substitute_now_keeps_corrupt_record_active() {
    let (_, service) = seeded(MalformedCreatedAtPolicy::SubstituteNow).await;

    let outcome = service.evaluate("broken-date").await.unwrap();
    assert!(matches!(outcome, EvaluationOutcome::Active { .. }));
}

#[test]
fn test_fixture_rejects_listing_without_id() {
    let err = Fixture::from_json(r#"{ "listings": [{ "status": "active", "userId": "u" }] }"#)
        .unwrap_err();
    assert!(err.to_string().contains("no id"));
}

#[tokio::test]
async fn test_loosely_typed_documents_are_evaluated() {
    let fixture = Fixture::from_json(
        r#"{
            "users": [{ "id": "odd-tier", "accountTier": 1 }],
            "listings": [
                { "id": "priced-as-text", "userId": "odd-tier", "status": "active",
                  "price": "12.50", "createdAt": "2024-01-01T00:00:00Z" },
                { "id": "odd-status", "userId": "odd-tier", "status": 4,
                  "createdAt": "2024-01-01T00:00:00Z" },
                { "id": "no-owner", "status": "active",
                  "createdAt": "2024-01-01T00:00:00Z" }
            ]
        }"#,
    )
    .unwrap();
    let store = Arc::new(InMemoryDocumentStore::from_fixture(fixture));
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(jan_first_2024() + Duration::hours(49)));
    let service = ListingLifecycleService::new(store.clone(), store.clone(), clock);

    // A non-string tier reads as free, so 49 hours is past the deadline.
    assert!(matches!(
        service.evaluate("priced-as-text").await.unwrap(),
        EvaluationOutcome::Archived { .. }
    ));
    assert!(matches!(
        service.evaluate("odd-status").await.unwrap(),
        EvaluationOutcome::DataIntegrityWarning { .. }
    ));
    assert!(matches!(
        service.evaluate("no-owner").await.unwrap(),
        EvaluationOutcome::Archived { .. }
    ));

    let archived = store.get_listing("priced-as-text").await.unwrap().unwrap();
    assert_eq!(archived.price, 12.5);
}
