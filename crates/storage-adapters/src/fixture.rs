//! Seed data loaded from a JSON file of `{ "users": [...], "listings": [...] }`.

use std::path::Path;

use domains::{DomainError, Listing, Result, UserAccount};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub users: Vec<UserAccount>,
    #[serde(default)]
    pub listings: Vec<Listing>,
}

impl Fixture {
    pub fn from_json(raw: &str) -> Result<Self> {
        let fixture: Fixture = serde_json::from_str(raw)
            .map_err(|err| DomainError::Validation(format!("invalid fixture: {err}")))?;
        if let Some(listing) = fixture.listings.iter().find(|l| l.id.is_empty()) {
            return Err(DomainError::Validation(format!(
                "fixture listing owned by {} has no id",
                listing.user_id
            )));
        }
        Ok(fixture)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|err| {
            DomainError::Validation(format!("cannot read fixture {}: {err}", path.display()))
        })?;
        Self::from_json(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::ListingStatus;

    #[test]
    fn test_parses_mixed_timestamp_shapes() {
        let fixture = Fixture::from_json(
            r#"{
                "users": [{ "id": "u1", "accountTier": "premium" }],
                "listings": [
                    { "id": "a", "userId": "u1", "status": "active",
                      "createdAt": { "_seconds": 1704067200, "_nanoseconds": 0 } },
                    { "id": "b", "userId": "u1", "status": "archived",
                      "createdAt": "2024-01-01T00:00:00Z", "expiresAt": 1704672000000 }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(fixture.users.len(), 1);
        assert_eq!(fixture.listings[1].status, ListingStatus::Archived);
    }

    #[test]
    fn test_rejects_listing_without_id() {
        let err = Fixture::from_json(r#"{ "listings": [{ "userId": "u1", "status": "active" }] }"#)
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
