//! # Postgres document store
//!
//! Keeps each document as a JSONB row in `documents(collection, id, body)`.
//! Conditional writes lock the row with `SELECT ... FOR UPDATE` inside a
//! transaction so the status check and the write commit together.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use tracing::info;

use domains::{
    ArchivalPatch, DomainError, Listing, ListingRepository, ListingStatus, MessageCounterStore,
    RestorePatch, Result, UserAccount, UserRepository,
};

use crate::collections::{LISTINGS, MESSAGE_ID_COUNTERS, USERS};
use crate::fixture::Fixture;

/// Undecodable rows are a data problem, not an outage.
fn store_err(err: sqlx::Error) -> DomainError {
    match err {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            DomainError::MalformedData(err.to_string())
        }
        other => DomainError::StoreUnavailable(other.to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(store_err)?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| DomainError::StoreUnavailable(format!("migration failed: {err}")))
    }

    /// Inserts or replaces a whole document.
    pub async fn put_document<T: Serialize + Sync>(
        &self,
        collection: &str,
        id: &str,
        body: &T,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3) \
             ON CONFLICT (collection, id) DO UPDATE SET body = EXCLUDED.body, updated_at = now()",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(body))
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    pub async fn import(&self, fixture: &Fixture) -> Result<()> {
        for user in &fixture.users {
            self.put_document(USERS, &user.id, user).await?;
        }
        for listing in &fixture.listings {
            self.put_document(LISTINGS, &listing.id, listing).await?;
        }
        info!(
            users = fixture.users.len(),
            listings = fixture.listings.len(),
            "fixture imported"
        );
        Ok(())
    }

    /// Locks the listing row, applies `apply` when the stored status equals
    /// `expected`, and commits. Returns whether the write happened.
    async fn conditional_update(
        &self,
        id: &str,
        expected: ListingStatus,
        apply: impl FnOnce(&mut Listing),
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let row: Option<(Json<Listing>,)> = sqlx::query_as(
            "SELECT body FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(LISTINGS)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(store_err)?;

        let Some((Json(mut listing),)) = row else {
            return Ok(false);
        };
        if listing.status != expected {
            return Ok(false);
        }
        apply(&mut listing);

        sqlx::query(
            "UPDATE documents SET body = $3, updated_at = now() WHERE collection = $1 AND id = $2",
        )
        .bind(LISTINGS)
        .bind(id)
        .bind(Json(&listing))
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        Ok(true)
    }
}

#[async_trait]
impl ListingRepository for PgDocumentStore {
    async fn get_listing(&self, id: &str) -> Result<Option<Listing>> {
        let row: Option<(Json<Listing>,)> =
            sqlx::query_as("SELECT body FROM documents WHERE collection = $1 AND id = $2")
                .bind(LISTINGS)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_err)?;

        Ok(row.map(|(Json(mut listing),)| {
            if listing.id.is_empty() {
                listing.id = id.to_string();
            }
            listing
        }))
    }

    async fn list_listing_ids(
        &self,
        status: ListingStatus,
        after: Option<String>,
        limit: usize,
    ) -> Result<Vec<String>> {
        sqlx::query_scalar(
            "SELECT id FROM documents WHERE collection = $1 AND body->>'status' = $2 \
             AND ($3::text IS NULL OR id > $3) ORDER BY id LIMIT $4",
        )
        .bind(LISTINGS)
        .bind(status.as_str())
        .bind(after)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)
    }

    async fn count_active_listings(&self, user_id: &str) -> Result<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM documents WHERE collection = $1 \
             AND body->>'userId' = $2 AND body->>'status' = 'active'",
        )
        .bind(LISTINGS)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn archive_listing(
        &self,
        id: &str,
        expected: ListingStatus,
        patch: &ArchivalPatch,
    ) -> Result<bool> {
        self.conditional_update(id, expected, |listing| patch.apply_to(listing))
            .await
    }

    async fn restore_listing(&self, id: &str, patch: &RestorePatch) -> Result<bool> {
        self.conditional_update(id, ListingStatus::Archived, |listing| {
            patch.apply_to(listing)
        })
        .await
    }
}

#[async_trait]
impl UserRepository for PgDocumentStore {
    async fn get_user(&self, id: &str) -> Result<Option<UserAccount>> {
        let row: Option<(Json<UserAccount>,)> =
            sqlx::query_as("SELECT body FROM documents WHERE collection = $1 AND id = $2")
                .bind(USERS)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_err)?;
        Ok(row.map(|(Json(user),)| user))
    }
}

#[async_trait]
impl MessageCounterStore for PgDocumentStore {
    async fn increment_counter(&self, bucket: &str) -> Result<u64> {
        // The upsert takes a row lock, so concurrent increments serialize.
        let value: i64 = sqlx::query_scalar(
            "INSERT INTO documents (collection, id, body) VALUES ($1, $2, '1'::jsonb) \
             ON CONFLICT (collection, id) DO UPDATE \
             SET body = to_jsonb((documents.body #>> '{}')::bigint + 1), updated_at = now() \
             RETURNING (body #>> '{}')::bigint",
        )
        .bind(MESSAGE_ID_COUNTERS)
        .bind(bucket)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| DomainError::TransactionConflict(err.to_string()))?;

        u64::try_from(value)
            .map_err(|_| DomainError::TransactionConflict(format!("negative counter {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_failures_are_malformed_data() {
        let decode = sqlx::Error::ColumnDecode {
            index: "body".to_string(),
            source: "expected an object".into(),
        };
        assert!(matches!(store_err(decode), DomainError::MalformedData(_)));
        assert!(matches!(
            store_err(sqlx::Error::Decode("bad jsonb".into())),
            DomainError::MalformedData(_)
        ));
        assert!(matches!(
            store_err(sqlx::Error::PoolTimedOut),
            DomainError::StoreUnavailable(_)
        ));
    }
}
