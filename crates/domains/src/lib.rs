//! The central domain model and port definitions for the listing lifecycle
//! engine.

pub mod clock;
pub mod error;
mod lenient;
pub mod models;
pub mod ports;
pub mod rate_limit;
pub mod tier;
pub mod timestamp;

// Re-exporting for easier access in other crates
pub use clock::*;
pub use error::*;
pub use models::*;
pub use ports::*;
pub use rate_limit::*;
pub use tier::*;
pub use timestamp::*;
