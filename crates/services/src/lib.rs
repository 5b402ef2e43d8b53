//! # services
//!
//! Use-cases of the listing lifecycle engine, written against the ports in
//! `domains` so every store can be swapped or mocked.

pub mod lifecycle;
pub mod message_id;
pub mod rate_limiter;

pub use lifecycle::{
    EvaluationOutcome, EvaluationReport, EvaluationStatus, ListingLifecycleService, ListingQuota,
    MalformedCreatedAtPolicy, SweepSummary,
};
pub use message_id::{
    extract_counter_from_message_id, extract_date_from_message_id, is_valid_message_id,
    MessageIdAllocator,
};
pub use rate_limiter::RateLimiter;
