//! # Listing lifecycle
//!
//! Decides whether a listing has outlived its tier duration and, when it has,
//! moves it to `archived` with a single conditional write.
//!
//! The expiration instant is the listing's explicit `expiresAt` when that is
//! readable, otherwise `createdAt + tier duration` of the owning seller. The
//! tier is resolved on every evaluation, so a seller upgrading to premium
//! extends listings that have not yet expired.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use domains::{
    AccountTier, ArchivalPatch, Clock, DomainError, ExpirationReason, Listing, ListingRepository,
    ListingStatus, RestorePatch, Result, StoredTimestamp, TierPolicy, UserRepository,
};

pub use domains::MalformedCreatedAtPolicy;


#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationOutcome {
    Active {
        expires_at: DateTime<Utc>,
    },
    Archived {
        archived_at: DateTime<Utc>,
        /// Retention deadline of the archived record.
        expires_at: DateTime<Utc>,
    },
    AlreadyArchived,
    NotFound,
    DataIntegrityWarning {
        detail: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Active,
    Archived,
    AlreadyArchived,
    NotFound,
    DataIntegrityWarning,
    Error,
}

/// Flat wire form of an evaluation, errors included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationReport {
    pub status: EvaluationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluationReport {
    fn status_only(status: EvaluationStatus) -> Self {
        Self {
            status,
            expires_at: None,
            archived_at: None,
            warning: None,
            error: None,
        }
    }
}

impl From<Result<EvaluationOutcome>> for EvaluationReport {
    fn from(result: Result<EvaluationOutcome>) -> Self {
        match result {
            Ok(EvaluationOutcome::Active { expires_at }) => Self {
                expires_at: Some(expires_at),
                ..Self::status_only(EvaluationStatus::Active)
            },
            Ok(EvaluationOutcome::Archived {
                archived_at,
                expires_at,
            }) => Self {
                expires_at: Some(expires_at),
                archived_at: Some(archived_at),
                ..Self::status_only(EvaluationStatus::Archived)
            },
            Ok(EvaluationOutcome::AlreadyArchived) => {
                Self::status_only(EvaluationStatus::AlreadyArchived)
            }
            Ok(EvaluationOutcome::NotFound) => Self::status_only(EvaluationStatus::NotFound),
            Ok(EvaluationOutcome::DataIntegrityWarning { detail }) => Self {
                warning: Some(detail),
                ..Self::status_only(EvaluationStatus::DataIntegrityWarning)
            },
            Err(err) => Self {
                error: Some(err.to_string()),
                ..Self::status_only(EvaluationStatus::Error)
            },
        }
    }
}

/// Tally of one sweep over active listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepSummary {
    /// Pages fetched from the store.
    pub batches: usize,
    pub evaluated: usize,
    pub active: usize,
    pub archived: usize,
    pub skipped: usize,
    pub warnings: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingQuota {
    pub tier: AccountTier,
    pub active_listings: u32,
    pub max_active_listings: Option<u32>,
    pub listing_duration_hours: i64,
    pub allowed: bool,
}

enum Deadline {
    At(DateTime<Utc>),
    Corrupt(String),
}

pub struct ListingLifecycleService {
    listings: Arc<dyn ListingRepository>,
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
    malformed_created_at: MalformedCreatedAtPolicy,
}

impl ListingLifecycleService {
    pub fn new(
        listings: Arc<dyn ListingRepository>,
        users: Arc<dyn UserRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            listings,
            users,
            clock,
            malformed_created_at: MalformedCreatedAtPolicy::default(),
        }
    }

    pub fn with_malformed_created_at(mut self, policy: MalformedCreatedAtPolicy) -> Self {
        self.malformed_created_at = policy;
        self
    }

    /// Evaluates one listing and archives it when its deadline has passed.
    ///
    /// Repeated evaluation of an archived listing is a no-op. Store failures
    /// come back as `Err`; nothing is retried here.
    #[tracing::instrument(skip(self))]
    pub async fn evaluate(&self, listing_id: &str) -> Result<EvaluationOutcome> {
        let listing = match self.listings.get_listing(listing_id).await {
            Ok(Some(listing)) => listing,
            Ok(None) => {
                debug!("listing not found");
                return Ok(EvaluationOutcome::NotFound);
            }
            Err(DomainError::MalformedData(detail)) => {
                warn!(%detail, "listing document could not be decoded");
                return Ok(EvaluationOutcome::DataIntegrityWarning { detail });
            }
            Err(err) => return Err(err),
        };

        match listing.status {
            ListingStatus::Archived => {
                debug!("listing already archived");
                return Ok(EvaluationOutcome::AlreadyArchived);
            }
            ListingStatus::Unknown => {
                let detail = format!("listing {listing_id} has an unrecognized status");
                warn!(%detail, "leaving listing untouched");
                return Ok(EvaluationOutcome::DataIntegrityWarning { detail });
            }
            ListingStatus::Active | ListingStatus::Sold | ListingStatus::Deleted => {}
        }

        let now = self.clock.now();
        let expires_at = match self.resolve_deadline(&listing, now).await? {
            Deadline::At(instant) => instant,
            Deadline::Corrupt(detail) => {
                warn!(%detail, "listing has no usable creation time");
                return Ok(EvaluationOutcome::DataIntegrityWarning { detail });
            }
        };

        if now <= expires_at {
            return Ok(EvaluationOutcome::Active { expires_at });
        }

        self.archive_at(&listing, ExpirationReason::TierDurationExceeded, now)
            .await
    }

    /// Archives `listing` now. Also the entry point for moderation actions.
    pub async fn archive(
        &self,
        listing: &Listing,
        reason: ExpirationReason,
    ) -> Result<EvaluationOutcome> {
        self.archive_at(listing, reason, self.clock.now()).await
    }

    async fn archive_at(
        &self,
        listing: &Listing,
        reason: ExpirationReason,
        now: DateTime<Utc>,
    ) -> Result<EvaluationOutcome> {
        let patch = ArchivalPatch::for_listing(listing, reason, now);
        let written = self
            .listings
            .archive_listing(&listing.id, listing.status, &patch)
            .await?;

        if !written {
            return self.after_lost_race(&listing.id).await;
        }

        info!(
            listing_id = %listing.id,
            previous_status = listing.status.as_str(),
            reason = reason.as_str(),
            retention_until = %patch.expires_at,
            "listing archived"
        );
        Ok(EvaluationOutcome::Archived {
            archived_at: patch.archived_at,
            expires_at: patch.expires_at,
        })
    }

    /// The conditional write found a different status; report what won.
    async fn after_lost_race(&self, listing_id: &str) -> Result<EvaluationOutcome> {
        match self.listings.get_listing(listing_id).await? {
            None => Ok(EvaluationOutcome::NotFound),
            Some(current) if current.status == ListingStatus::Archived => {
                debug!(listing_id, "concurrent evaluation archived first");
                Ok(EvaluationOutcome::AlreadyArchived)
            }
            Some(current) => Err(DomainError::TransactionConflict(format!(
                "listing {listing_id} changed to {} during evaluation",
                current.status.as_str()
            ))),
        }
    }

    async fn resolve_deadline(&self, listing: &Listing, now: DateTime<Utc>) -> Result<Deadline> {
        if let Some(explicit) = &listing.expires_at {
            match explicit.normalize() {
                Ok(instant) => return Ok(Deadline::At(instant)),
                Err(err) => warn!(
                    listing_id = %listing.id,
                    error = %err,
                    "unreadable expiresAt, falling back to tier duration"
                ),
            }
        }

        let policy = self.tier_policy(&listing.user_id).await?;
        let created_at = match listing.created_at.as_ref().map(StoredTimestamp::normalize) {
            Some(Ok(instant)) => instant,
            unusable => {
                let detail = match unusable {
                    Some(Err(err)) => format!("createdAt of listing {}: {err}", listing.id),
                    _ => format!("listing {} has no createdAt", listing.id),
                };
                match self.malformed_created_at {
                    MalformedCreatedAtPolicy::Flag => return Ok(Deadline::Corrupt(detail)),
                    MalformedCreatedAtPolicy::SubstituteNow => {
                        warn!(%detail, "substituting current time for createdAt");
                        now
                    }
                }
            }
        };

        Ok(Deadline::At(created_at + policy.listing_duration()))
    }

    /// Missing or undecodable users and unknown tiers resolve to the free
    /// policy.
    async fn tier_policy(&self, user_id: &str) -> Result<&'static TierPolicy> {
        let user = match self.users.get_user(user_id).await {
            Ok(user) => user,
            Err(DomainError::MalformedData(detail)) => {
                warn!(user_id, %detail, "unreadable user document, using free tier");
                None
            }
            Err(err) => return Err(err),
        };
        Ok(user.map(|user| user.tier()).unwrap_or_default().policy())
    }

    /// Evaluates every active listing, each independently, reading ids in
    /// pages of `batch_size` keyed on the last id seen. Archiving during the
    /// walk does not shift later pages.
    pub async fn sweep(&self, batch_size: usize) -> Result<SweepSummary> {
        let batch_size = batch_size.max(1);
        let mut summary = SweepSummary::default();
        let mut cursor: Option<String> = None;

        loop {
            let ids = self
                .listings
                .list_listing_ids(ListingStatus::Active, cursor.clone(), batch_size)
                .await?;
            summary.batches += 1;
            let last_page = ids.len() < batch_size;

            for id in &ids {
                summary.evaluated += 1;
                match self.evaluate(id).await {
                    Ok(EvaluationOutcome::Active { .. }) => summary.active += 1,
                    Ok(EvaluationOutcome::Archived { .. }) => summary.archived += 1,
                    Ok(EvaluationOutcome::AlreadyArchived | EvaluationOutcome::NotFound) => {
                        summary.skipped += 1
                    }
                    Ok(EvaluationOutcome::DataIntegrityWarning { .. }) => summary.warnings += 1,
                    Err(err) => {
                        warn!(listing_id = %id, error = %err, "evaluation failed during sweep");
                        summary.errors += 1;
                    }
                }
            }

            match ids.into_iter().last() {
                Some(last) if !last_page => cursor = Some(last),
                _ => break,
            }
        }

        info!(
            batches = summary.batches,
            evaluated = summary.evaluated,
            archived = summary.archived,
            errors = summary.errors,
            "sweep complete"
        );
        Ok(summary)
    }

    /// Brings an archived listing back while its retention window is open.
    /// The restored listing gets a fresh tier duration from now.
    #[tracing::instrument(skip(self))]
    pub async fn restore(&self, listing_id: &str) -> Result<Listing> {
        let mut listing = self
            .listings
            .get_listing(listing_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Listing", listing_id))?;

        if listing.status != ListingStatus::Archived {
            return Err(DomainError::Validation(format!(
                "listing {listing_id} is {}, only archived listings can be restored",
                listing.status.as_str()
            )));
        }

        let now = self.clock.now();
        let retention_deadline = listing
            .expires_at
            .as_ref()
            .ok_or_else(|| {
                DomainError::Validation(format!("listing {listing_id} has no retention deadline"))
            })?
            .normalize()?;
        if now > retention_deadline {
            return Err(DomainError::Validation(format!(
                "retention window of listing {listing_id} closed at {retention_deadline}"
            )));
        }

        // Only listings that were live or sold come back; a deleted one stays gone.
        let status = match listing.previous_status {
            Some(ListingStatus::Active) => ListingStatus::Active,
            Some(ListingStatus::Sold) => ListingStatus::Sold,
            other => {
                return Err(DomainError::Validation(format!(
                    "listing {listing_id} was {} before archival and cannot be restored",
                    other.map_or("in an unknown state", |status| status.as_str())
                )))
            }
        };
        let policy = self.tier_policy(&listing.user_id).await?;
        if status == ListingStatus::Active {
            let active = self.listings.count_active_listings(&listing.user_id).await?;
            if !policy.allows_another_listing(active) {
                return Err(DomainError::Validation(format!(
                    "{} tier allows {} active listings",
                    policy.tier.as_str(),
                    policy.max_active_listings.unwrap_or(active)
                )));
            }
        }

        let patch = RestorePatch {
            status,
            expires_at: now + policy.listing_duration(),
            updated_at: now,
        };
        if !self.listings.restore_listing(listing_id, &patch).await? {
            return Err(DomainError::TransactionConflict(format!(
                "listing {listing_id} left the archived state during restore"
            )));
        }

        patch.apply_to(&mut listing);
        info!(listing_id, status = status.as_str(), expires_at = %patch.expires_at, "listing restored");
        Ok(listing)
    }

    /// Whether `user_id` may create another active listing under its tier.
    pub async fn listing_quota(&self, user_id: &str) -> Result<ListingQuota> {
        let policy = self.tier_policy(user_id).await?;
        let active_listings = self.listings.count_active_listings(user_id).await?;
        Ok(ListingQuota {
            tier: policy.tier,
            active_listings,
            max_active_listings: policy.max_active_listings,
            listing_duration_hours: policy.listing_duration_hours,
            allowed: policy.allows_another_listing(active_listings),
        })
    }
}
