//! # Domain Models
//!
//! These structs represent the documents the lifecycle engine reads and
//! writes. Field names serialize in camelCase to match the persisted layout
//! (`listings/{id}`, `users/{id}`).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::lenient;

use crate::tier::AccountTier;
use crate::timestamp::StoredTimestamp;

/// How long an archived listing is kept before a purge may act on it.
pub const ARCHIVE_RETENTION_DAYS: i64 = 7;

pub fn archive_retention() -> Duration {
    Duration::days(ARCHIVE_RETENTION_DAYS)
}

/// What to do when a listing has no usable expiry and its `createdAt` is
/// missing or unparseable. Shared by the evaluator and its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedCreatedAtPolicy {
    /// Report `data_integrity_warning` and leave the record untouched.
    #[default]
    Flag,
    /// Treat the listing as created now. Grants a full fresh duration.
    SubstituteNow,
}

/// Stored listing status. Anything unrecognized, including a missing or
/// non-string value, decodes as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Archived,
    Sold,
    Deleted,
    #[default]
    Unknown,
}

impl ListingStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "active" => ListingStatus::Active,
            "archived" => ListingStatus::Archived,
            "sold" => ListingStatus::Sold,
            "deleted" => ListingStatus::Deleted,
            _ => ListingStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Archived => "archived",
            ListingStatus::Sold => "sold",
            ListingStatus::Deleted => "deleted",
            ListingStatus::Unknown => "unknown",
        }
    }
}

impl<'de> Deserialize<'de> for ListingStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(value.as_str().map_or(ListingStatus::Unknown, ListingStatus::parse))
    }
}

/// Why a listing left the active state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationReason {
    TierDurationExceeded,
    Moderation,
}

impl ExpirationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpirationReason::TierDurationExceeded => "tier_duration_exceeded",
            ExpirationReason::Moderation => "moderation",
        }
    }
}

/// A for-sale card listing.
///
/// While `status == Archived`, `expires_at` holds the archival retention
/// deadline rather than the original listing deadline. Decoding never fails
/// on a single bad field; see [`ListingStatus`] and the lenient decoders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    /// Numeric strings such as `"12.50"` are accepted.
    #[serde(default, deserialize_with = "lenient::price")]
    pub price: f64,
    /// Game category (e.g., "pokemon", "mtg")
    #[serde(default, deserialize_with = "lenient::string")]
    pub game: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub condition: String,
    #[serde(default)]
    pub status: ListingStatus,
    /// Owning seller; empty when missing, which resolves to the free tier.
    #[serde(default, deserialize_with = "lenient::string")]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<StoredTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<StoredTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<StoredTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_created_at: Option<StoredTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<ListingStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_expires_at: Option<StoredTimestamp>,
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiration_reason: Option<ExpirationReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<StoredTimestamp>,
}

impl Listing {
    /// A fresh active listing, as the creation workflow would write it.
    pub fn new_active(
        id: impl Into<String>,
        user_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            description: String::new(),
            price: 0.0,
            game: String::new(),
            condition: String::new(),
            status: ListingStatus::Active,
            user_id: user_id.into(),
            created_at: Some(created_at.into()),
            expires_at: None,
            archived_at: None,
            original_created_at: None,
            previous_status: None,
            previous_expires_at: None,
            expiration_reason: None,
            updated_at: Some(created_at.into()),
        }
    }
}

/// Owning account of a listing. Only the tier is consumed here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    #[serde(default)]
    pub id: String,
    /// Raw stored tier name; may be absent or unrecognized. Non-string
    /// values decode as absent.
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub account_tier: Option<String>,
}

impl UserAccount {
    pub fn tier(&self) -> AccountTier {
        self.account_tier
            .as_deref()
            .map(AccountTier::parse)
            .unwrap_or_default()
    }
}

/// The single write performed by the archival transition.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivalPatch {
    pub archived_at: DateTime<Utc>,
    pub original_created_at: Option<StoredTimestamp>,
    pub previous_status: ListingStatus,
    pub previous_expires_at: Option<StoredTimestamp>,
    /// Retention deadline, `archived_at + 7 days`.
    pub expires_at: DateTime<Utc>,
    pub reason: ExpirationReason,
    pub updated_at: DateTime<Utc>,
}

impl ArchivalPatch {
    /// Builds the patch for `listing` archived at `now`.
    pub fn for_listing(listing: &Listing, reason: ExpirationReason, now: DateTime<Utc>) -> Self {
        Self {
            archived_at: now,
            original_created_at: listing.created_at.clone(),
            previous_status: listing.status,
            previous_expires_at: listing.expires_at.clone(),
            expires_at: now + archive_retention(),
            reason,
            updated_at: now,
        }
    }

    pub fn apply_to(&self, listing: &mut Listing) {
        listing.status = ListingStatus::Archived;
        listing.archived_at = Some(self.archived_at.into());
        listing.original_created_at = self.original_created_at.clone();
        listing.previous_status = Some(self.previous_status);
        listing.previous_expires_at = self.previous_expires_at.clone();
        listing.expires_at = Some(self.expires_at.into());
        listing.expiration_reason = Some(self.reason);
        listing.updated_at = Some(self.updated_at.into());
    }
}

/// Write that brings an archived listing back inside its retention window.
#[derive(Debug, Clone, PartialEq)]
pub struct RestorePatch {
    pub status: ListingStatus,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RestorePatch {
    pub fn apply_to(&self, listing: &mut Listing) {
        listing.status = self.status;
        listing.expires_at = Some(self.expires_at.into());
        listing.updated_at = Some(self.updated_at.into());
        listing.archived_at = None;
        listing.previous_status = None;
        listing.previous_expires_at = None;
        listing.expiration_reason = None;
        if let Some(original) = listing.original_created_at.take() {
            listing.created_at = Some(original);
        }
    }
}
