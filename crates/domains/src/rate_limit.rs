//! Fixed-window rate-limit arithmetic shared by every counter backend.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Limit applied to one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub limit: u32,
    pub window: Duration,
}

impl RateLimitRule {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }
}

/// Stored state of a single `(client, endpoint)` counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

impl WindowState {
    /// A window stays in force up to and including `reset_at`; the count
    /// restarts once `now` has passed it.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.reset_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_time: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, as sent in `Retry-After`.
    /// Never negative; a partial second rounds up.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> i64 {
        let millis = (self.reset_time - now).num_milliseconds().max(0);
        (millis + 999) / 1000
    }
}

/// Advances a counter by one request.
///
/// A missing or elapsed window restarts at `count = 1`. A full window is
/// rejected without incrementing past the limit.
pub fn step_window(
    existing: Option<WindowState>,
    rule: &RateLimitRule,
    now: DateTime<Utc>,
) -> (WindowState, RateLimitDecision) {
    let state = match existing {
        Some(state) if !state.is_expired(now) => {
            if state.count >= rule.limit {
                return (
                    state,
                    RateLimitDecision {
                        allowed: false,
                        limit: rule.limit,
                        remaining: 0,
                        reset_time: state.reset_at,
                    },
                );
            }
            WindowState {
                count: state.count + 1,
                reset_at: state.reset_at,
            }
        }
        _ => WindowState {
            count: 1,
            reset_at: now + rule.window,
        },
    };

    let decision = RateLimitDecision {
        allowed: state.count <= rule.limit,
        limit: rule.limit,
        remaining: rule.limit.saturating_sub(state.count),
        reset_time: state.reset_at,
    };
    (state, decision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_fills_then_rejects() {
        let rule = RateLimitRule::new(5, Duration::seconds(60));
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut state = None;

        for expected_remaining in [4, 3, 2, 1, 0] {
            let (next, decision) = step_window(state, &rule, t0 + Duration::seconds(1));
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
            state = Some(next);
        }

        let (held, rejected) = step_window(state, &rule, t0 + Duration::seconds(30));
        assert!(!rejected.allowed);
        assert_eq!(held.count, 5);

        let (reset, decision) = step_window(Some(held), &rule, t0 + Duration::seconds(61));
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 4);
        assert_eq!(reset.count, 1);
    }

    #[test]
    fn test_window_holds_at_exact_reset_instant() {
        let rule = RateLimitRule::new(1, Duration::seconds(60));
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let (full, _) = step_window(None, &rule, t0);

        let (_, at_reset) = step_window(Some(full), &rule, full.reset_at);
        assert!(!at_reset.allowed);

        let (next, after_reset) =
            step_window(Some(full), &rule, full.reset_at + Duration::milliseconds(1));
        assert!(after_reset.allowed);
        assert_eq!(next.count, 1);
    }

    #[test]
    fn test_retry_after_counts_from_given_instant() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let (_, decision) = step_window(None, &RateLimitRule::new(1, Duration::seconds(60)), t0);

        assert_eq!(decision.retry_after_secs(t0), 60);
        assert_eq!(decision.retry_after_secs(t0 + Duration::milliseconds(59_500)), 1);
        assert_eq!(decision.retry_after_secs(t0 + Duration::seconds(90)), 0);
    }

    #[test]
    fn test_zero_limit_never_allows() {
        let rule = RateLimitRule::new(0, Duration::seconds(60));
        let (_, decision) = step_window(None, &rule, Utc::now());
        assert!(!decision.allowed);
    }
}
