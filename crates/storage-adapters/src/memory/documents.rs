use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use domains::{
    ArchivalPatch, Listing, ListingRepository, ListingStatus, MessageCounterStore, RestorePatch,
    Result, UserAccount, UserRepository,
};

use crate::fixture::Fixture;

#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    listings: DashMap<String, Listing>,
    users: DashMap<String, UserAccount>,
    counters: DashMap<String, u64>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        let store = Self::new();
        for user in fixture.users {
            store.insert_user(user);
        }
        for listing in fixture.listings {
            store.insert_listing(listing);
        }
        debug!(
            users = store.users.len(),
            listings = store.listings.len(),
            "in-memory store seeded"
        );
        store
    }

    pub fn insert_listing(&self, listing: Listing) {
        self.listings.insert(listing.id.clone(), listing);
    }

    pub fn insert_user(&self, user: UserAccount) {
        self.users.insert(user.id.clone(), user);
    }

    /// Current value of the message counter for `bucket`, if any.
    pub fn counter(&self, bucket: &str) -> Option<u64> {
        self.counters.get(bucket).map(|value| *value)
    }
}

#[async_trait]
impl ListingRepository for InMemoryDocumentStore {
    async fn get_listing(&self, id: &str) -> Result<Option<Listing>> {
        Ok(self.listings.get(id).map(|entry| entry.value().clone()))
    }

    async fn list_listing_ids(
        &self,
        status: ListingStatus,
        after: Option<String>,
        limit: usize,
    ) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self
            .listings
            .iter()
            .filter(|entry| entry.status == status)
            .filter(|entry| after.as_deref().map_or(true, |cursor| entry.key().as_str() > cursor))
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids.truncate(limit);
        Ok(ids)
    }

    async fn count_active_listings(&self, user_id: &str) -> Result<u32> {
        let count = self
            .listings
            .iter()
            .filter(|entry| entry.user_id == user_id && entry.status == ListingStatus::Active)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn archive_listing(
        &self,
        id: &str,
        expected: ListingStatus,
        patch: &ArchivalPatch,
    ) -> Result<bool> {
        match self.listings.get_mut(id) {
            Some(mut entry) if entry.status == expected => {
                patch.apply_to(entry.value_mut());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restore_listing(&self, id: &str, patch: &RestorePatch) -> Result<bool> {
        match self.listings.get_mut(id) {
            Some(mut entry) if entry.status == ListingStatus::Archived => {
                patch.apply_to(entry.value_mut());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryDocumentStore {
    async fn get_user(&self, id: &str) -> Result<Option<UserAccount>> {
        Ok(self.users.get(id).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl MessageCounterStore for InMemoryDocumentStore {
    async fn increment_counter(&self, bucket: &str) -> Result<u64> {
        let mut counter = self.counters.entry(bucket.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}
