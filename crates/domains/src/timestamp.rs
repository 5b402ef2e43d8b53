//! # Stored timestamps
//!
//! Documents written by different clients carry creation and expiry instants
//! in three shapes: the store-native `{seconds, nanoseconds}` pair, a native
//! date serialized as epoch milliseconds, or an ISO-8601 string. Every shape
//! is decoded into [`StoredTimestamp`] and converted through one function,
//! [`StoredTimestamp::normalize`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// Store-native timestamp. Accepts both the public (`seconds`) and the
/// admin-SDK (`_seconds`) field spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeTimestamp {
    #[serde(alias = "_seconds")]
    pub seconds: i64,
    #[serde(alias = "_nanoseconds", default)]
    pub nanoseconds: u32,
}

/// Any timestamp value found in a persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredTimestamp {
    Native(NativeTimestamp),
    EpochMillis(i64),
    Iso(String),
    /// Kept so a corrupt field never fails the whole document decode.
    Unrecognized(serde_json::Value),
}

impl StoredTimestamp {
    /// Converts to a UTC instant, failing on unparseable values and
    /// unrecognized shapes.
    pub fn normalize(&self) -> Result<DateTime<Utc>> {
        match self {
            Self::Native(native) => DateTime::from_timestamp(native.seconds, native.nanoseconds)
                .ok_or_else(|| {
                    DomainError::MalformedTimestamp(format!(
                        "native timestamp out of range: {}s {}ns",
                        native.seconds, native.nanoseconds
                    ))
                }),
            Self::EpochMillis(millis) => DateTime::from_timestamp_millis(*millis).ok_or_else(|| {
                DomainError::MalformedTimestamp(format!("epoch millis out of range: {millis}"))
            }),
            Self::Iso(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|parsed| parsed.with_timezone(&Utc))
                .map_err(|err| DomainError::MalformedTimestamp(format!("{raw:?}: {err}"))),
            Self::Unrecognized(value) => Err(DomainError::MalformedTimestamp(format!(
                "unrecognized timestamp shape: {value}"
            ))),
        }
    }
}

impl From<DateTime<Utc>> for StoredTimestamp {
    fn from(instant: DateTime<Utc>) -> Self {
        Self::Native(NativeTimestamp {
            seconds: instant.timestamp(),
            nanoseconds: instant.timestamp_subsec_nanos(),
        })
    }
}
