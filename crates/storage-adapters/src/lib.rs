//! # storage-adapters
//!
//! Implementations of the `domains` ports. The in-memory adapters are always
//! compiled; Postgres and Redis backends sit behind cargo features.

pub mod fixture;
pub mod memory;

#[cfg(feature = "db-postgres")]
pub mod postgres;

#[cfg(feature = "redis")]
pub mod redis;

pub use fixture::Fixture;
pub use memory::{InMemoryDocumentStore, InMemoryRateLimitStore};

#[cfg(feature = "db-postgres")]
pub use postgres::PgDocumentStore;

#[cfg(feature = "redis")]
pub use self::redis::RedisRateLimitStore;

/// Collection names shared by every document backend.
pub mod collections {
    pub const LISTINGS: &str = "listings";
    pub const USERS: &str = "users";
    pub const MESSAGE_ID_COUNTERS: &str = "system/messageIdCounters";
}
