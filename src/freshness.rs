use std::time::{Duration, Instant};

use crate::types::FreshnessLevel;

/// Classifies how old the last accepted sample is.
///
/// Holds only the thresholds; the acceptance timestamp is owned by the
/// orientation state and passed in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FreshnessTracker {
    live_within: Duration,
    stale_within: Duration,
}

impl FreshnessTracker {
    pub fn new(live_within: Duration, stale_within: Duration) -> Self {
        FreshnessTracker {
            live_within,
            stale_within,
        }
    }

    pub fn classify(&self, now: Instant, last_accepted: Option<Instant>) -> FreshnessLevel {
        match last_accepted {
            Some(at) => self.classify_age(now.saturating_duration_since(at)),
            None => FreshnessLevel::Old,
        }
    }

    pub fn classify_age(&self, age: Duration) -> FreshnessLevel {
        if age < self.live_within {
            FreshnessLevel::Live
        } else if age < self.stale_within {
            FreshnessLevel::Stale
        } else {
            FreshnessLevel::Old
        }
    }
}

impl Default for FreshnessTracker {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(2))
    }
}
