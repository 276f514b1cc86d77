//! Periodic deadlines driven by an explicit clock
use std::time::{Duration, Instant};

/// A repeating deadline, such as the SSDP re-announce
///
/// The timer is "due immediately" when created or reset. Callers pass
/// in the current time rather than the timer reading a clock, so that
/// a single-threaded tick loop (and its tests) decide what "now" is.
#[derive(Debug, Clone)]
pub struct RefreshTimer {
    period: Duration,
    next: Instant,
}

impl RefreshTimer {
    /// Create a new [`RefreshTimer`], due at `now`
    #[must_use]
    pub fn new(period: Duration, now: Instant) -> Self {
        Self { period, next: now }
    }

    /// Make the timer due again at `now`
    pub fn reset(&mut self, now: Instant) {
        self.next = now;
    }

    /// When the timer next falls due
    #[must_use]
    pub fn next_refresh(&self) -> Instant {
        self.next
    }

    /// Whether the deadline has been reached
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next
    }

    /// Record that the periodic work has been done
    ///
    /// Does nothing if the timer is not yet due. Otherwise the next
    /// deadline is one period after `now`; a tick loop that has fallen
    /// behind does not get a burst of catch-up salvos.
    pub fn update_refresh(&mut self, now: Instant) {
        if now < self.next {
            return;
        }
        self.next = now + self.period;
    }

    /// How long until the timer falls due (zero if already due)
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        self.next.saturating_duration_since(now)
    }
}
