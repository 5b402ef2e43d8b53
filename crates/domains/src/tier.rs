//! # Tier Policy Table
//!
//! Account tiers govern how long a listing stays active and how many active
//! listings a seller may hold. The table is policy compiled into the binary;
//! it is never read from the store.

use chrono::Duration;
use serde::Serialize;

/// An account plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountTier {
    #[default]
    Free,
    Premium,
}

impl AccountTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountTier::Free => "free",
            AccountTier::Premium => "premium",
        }
    }

    /// Parses a stored tier name. Unknown or empty names fail closed to `Free`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "premium" => AccountTier::Premium,
            _ => AccountTier::Free,
        }
    }

    pub fn policy(self) -> &'static TierPolicy {
        match self {
            AccountTier::Free => &FREE_POLICY,
            AccountTier::Premium => &PREMIUM_POLICY,
        }
    }
}

/// Feature switches unlocked per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierFeatures {
    pub offers: bool,
    pub bulk_listing: bool,
    pub advanced_analytics: bool,
    pub priority_support: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierPolicy {
    pub tier: AccountTier,
    pub listing_duration_hours: i64,
    /// `None` means unlimited.
    pub max_active_listings: Option<u32>,
    pub features: TierFeatures,
}

pub const FREE_POLICY: TierPolicy = TierPolicy {
    tier: AccountTier::Free,
    listing_duration_hours: 48,
    max_active_listings: Some(2),
    features: TierFeatures {
        offers: true,
        bulk_listing: false,
        advanced_analytics: false,
        priority_support: false,
    },
};

pub const PREMIUM_POLICY: TierPolicy = TierPolicy {
    tier: AccountTier::Premium,
    listing_duration_hours: 720,
    max_active_listings: None,
    features: TierFeatures {
        offers: true,
        bulk_listing: true,
        advanced_analytics: true,
        priority_support: true,
    },
};

pub const TIER_POLICIES: [TierPolicy; 2] = [FREE_POLICY, PREMIUM_POLICY];

impl TierPolicy {
    pub fn listing_duration(&self) -> Duration {
        Duration::hours(self.listing_duration_hours)
    }

    pub fn allows_another_listing(&self, active_listings: u32) -> bool {
        self.max_active_listings
            .is_none_or(|max| active_listings < max)
    }
}

/// Looks up the policy for an optional stored tier name.
pub fn policy_for(tier_name: Option<&str>) -> &'static TierPolicy {
    tier_name.map(AccountTier::parse).unwrap_or_default().policy()
}
