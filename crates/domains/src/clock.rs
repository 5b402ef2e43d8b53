//! Time provider abstraction for testable time-dependent code.

use chrono::{DateTime, Utc};

/// Source of "now" for every lifecycle decision.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production implementation that uses the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(any(test, feature = "testing"))]
pub use manual::ManualClock;

#[cfg(any(test, feature = "testing"))]
mod manual {
    use super::Clock;
    use chrono::{DateTime, Duration, Utc};
    use std::sync::{Arc, Mutex};

    /// Clock with a controllable instant. Clones share state.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        current: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                current: Arc::new(Mutex::new(start)),
            }
        }

        pub fn set(&self, instant: DateTime<Utc>) {
            *self.current.lock().unwrap() = instant;
        }

        pub fn advance(&self, by: Duration) {
            let mut current = self.current.lock().unwrap();
            *current += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.current.lock().unwrap()
        }
    }
}
