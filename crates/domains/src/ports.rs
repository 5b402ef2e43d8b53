//! # Ports
//!
//! Any storage adapter must implement these traits to be wired into the
//! services.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{ArchivalPatch, Listing, ListingStatus, RestorePatch, UserAccount};
use crate::rate_limit::{RateLimitDecision, RateLimitRule};

/// Persistence contract for the `listings` collection.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ListingRepository: Send + Sync {
    async fn get_listing(&self, id: &str) -> Result<Option<Listing>>;

    /// One page of ids of listings currently in `status`, in ascending id
    /// order, strictly after the `after` cursor and at most `limit` long.
    async fn list_listing_ids(
        &self,
        status: ListingStatus,
        after: Option<String>,
        limit: usize,
    ) -> Result<Vec<String>>;

    async fn count_active_listings(&self, user_id: &str) -> Result<u32>;

    /// Writes `patch` only if the stored status still equals `expected`.
    /// Returns `false` when another writer moved the status first.
    async fn archive_listing(
        &self,
        id: &str,
        expected: ListingStatus,
        patch: &ArchivalPatch,
    ) -> Result<bool>;

    /// Writes `patch` only if the stored status is still `Archived`.
    async fn restore_listing(&self, id: &str, patch: &RestorePatch) -> Result<bool>;
}

/// Read-only access to the `users` collection.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, id: &str) -> Result<Option<UserAccount>>;
}

/// Per-day message counters (`system/messageIdCounters/{YYYYMMDD}`).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageCounterStore: Send + Sync {
    /// Atomically increments the counter for `bucket` and returns the new
    /// value. Concurrent callers never observe the same value.
    async fn increment_counter(&self, bucket: &str) -> Result<u64>;
}

/// Backing store for rate-limit counters.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Atomically advances the counter under `key` by one request.
    async fn hit(
        &self,
        key: &str,
        rule: &RateLimitRule,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision>;

    /// Drops counters whose window has elapsed. Returns how many were removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}
