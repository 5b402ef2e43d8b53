//! Process-local adapters backed by `DashMap`.
//!
//! Every conditional write and counter increment runs while holding the
//! shard lock of its key, which makes it atomic within this process.

mod documents;
mod rate_limit;

pub use documents::InMemoryDocumentStore;
pub use rate_limit::InMemoryRateLimitStore;
