//! Tracks a rolling window of persistence failures. A camera
//! worker that can still pull frames but can't reach the store is still
//! broken from an operator's point of view once the outage has lasted
//! longer than `PERSISTENCE_FAIL_WINDOW` — this is the component that
//! decides when that's true.

use std::time::Duration;

use chrono::{DateTime, Utc};

pub struct PersistenceFailureTracker {
    window: Duration,
    first_failure_at: Option<DateTime<Utc>>,
}

impl PersistenceFailureTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            first_failure_at: None,
        }
    }

    /// Record a persistence failure at `now`. Returns `true` once the
    /// continuous failure streak has lasted longer than the configured
    /// window — the caller should treat the worker as failed.
    pub fn record_failure(&mut self, now: DateTime<Utc>) -> bool {
        let since = *self.first_failure_at.get_or_insert(now);
        match chrono::Duration::from_std(self.window) {
            Ok(window) => now.signed_duration_since(since) > window,
            Err(_) => false,
        }
    }

    pub fn record_success(&mut self) {
        self.first_failure_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_outage_does_not_trip() {
        let mut tracker = PersistenceFailureTracker::new(Duration::from_secs(30));
        let now = Utc::now();
        assert!(!tracker.record_failure(now));
        assert!(!tracker.record_failure(now + chrono::Duration::seconds(10)));
    }

    #[test]
    fn outage_past_window_trips() {
        let mut tracker = PersistenceFailureTracker::new(Duration::from_secs(30));
        let now = Utc::now();
        tracker.record_failure(now);
        assert!(tracker.record_failure(now + chrono::Duration::seconds(31)));
    }

    #[test]
    fn success_resets_the_streak() {
        let mut tracker = PersistenceFailureTracker::new(Duration::from_secs(30));
        let now = Utc::now();
        tracker.record_failure(now);
        tracker.record_success();
        assert!(!tracker.record_failure(now + chrono::Duration::seconds(31)));
    }
}
