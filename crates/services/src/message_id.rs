//! Message ids of the form `MSG{YYYYMMDD}{counter:07}`.
//!
//! The counter comes from an atomic per-day increment in the store. When the
//! store cannot allocate, the trailing seven digits of the wall-clock epoch
//! milliseconds stand in for the counter: such ids are not monotonic and may
//! collide, but allocation never fails.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;

use domains::{Clock, MessageCounterStore};

pub const MESSAGE_ID_PREFIX: &str = "MSG";
const DATE_DIGITS: usize = 8;
const COUNTER_DIGITS: usize = 7;
const MAX_COUNTER: u64 = 9_999_999;

pub struct MessageIdAllocator {
    counters: Arc<dyn MessageCounterStore>,
    clock: Arc<dyn Clock>,
}

impl MessageIdAllocator {
    pub fn new(counters: Arc<dyn MessageCounterStore>, clock: Arc<dyn Clock>) -> Self {
        Self { counters, clock }
    }

    pub async fn allocate(&self) -> String {
        let now = self.clock.now();
        let bucket = date_bucket(now);

        match self.counters.increment_counter(&bucket).await {
            Ok(counter) if counter <= MAX_COUNTER => format_message_id(&bucket, counter),
            Ok(counter) => {
                warn!(%bucket, counter, "daily message counter exhausted, using fallback id");
                fallback_message_id(now)
            }
            Err(err) => {
                warn!(%bucket, error = %err, "message counter unavailable, using fallback id");
                fallback_message_id(now)
            }
        }
    }
}

/// UTC calendar day of `now` as `YYYYMMDD`.
pub fn date_bucket(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d").to_string()
}

pub fn format_message_id(bucket: &str, counter: u64) -> String {
    format!("{MESSAGE_ID_PREFIX}{bucket}{counter:0width$}", width = COUNTER_DIGITS)
}

pub fn fallback_message_id(now: DateTime<Utc>) -> String {
    let trailing = now.timestamp_millis().rem_euclid(MAX_COUNTER as i64 + 1);
    format_message_id(&date_bucket(now), trailing as u64)
}

fn parse_message_id(id: &str) -> Option<(NaiveDate, u32)> {
    let digits = id.strip_prefix(MESSAGE_ID_PREFIX)?;
    if digits.len() != DATE_DIGITS + COUNTER_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let (date, counter) = digits.split_at(DATE_DIGITS);
    let date = NaiveDate::parse_from_str(date, "%Y%m%d").ok()?;
    Some((date, counter.parse().ok()?))
}

pub fn extract_date_from_message_id(id: &str) -> Option<NaiveDate> {
    parse_message_id(id).map(|(date, _)| date)
}

pub fn extract_counter_from_message_id(id: &str) -> Option<u32> {
    parse_message_id(id).map(|(_, counter)| counter)
}

pub fn is_valid_message_id(id: &str) -> bool {
    parse_message_id(id).is_some()
}
