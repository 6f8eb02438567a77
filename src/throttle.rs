//! Notification rate limiting.
//!
//! One confirmed motion event should produce at most one email per cooldown
//! window. [`NotifyThrottle`] tracks the time of the last notification that
//! actually went out; events landing inside the window are suppressed, and a
//! failed send leaves the window unarmed so the next event retries.

use std::time::{Duration, Instant};

/// Cooldown gate over outbound notifications.
pub struct NotifyThrottle {
    cooldown: Duration,
    last_notified: Option<Instant>,
}

impl NotifyThrottle {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_notified: None,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Whether a notification may go out at `now`.
    ///
    /// True iff nothing has been sent yet, or strictly more than the
    /// cooldown has elapsed since the last success. An elapsed time exactly
    /// equal to the cooldown still suppresses.
    pub fn should_notify(&self, now: Instant) -> bool {
        match self.last_notified {
            None => true,
            Some(last) => now.duration_since(last) > self.cooldown,
        }
    }

    /// Arm the cooldown window. Call only after the notifier reports
    /// success; a failed send must not consume the window. The recorded
    /// timestamp never moves backwards.
    pub fn record_success(&mut self, now: Instant) {
        self.last_notified = Some(match self.last_notified {
            Some(last) if last > now => last,
            _ => now,
        });
    }

    /// Seed the window from a prior run's record: treat the last success as
    /// having happened `elapsed` before `now`. Used when the on-disk ledger
    /// shows a recent notification at startup.
    pub fn preload(&mut self, elapsed: Duration, now: Instant) {
        if let Some(last) = now.checked_sub(elapsed) {
            self.last_notified = Some(last);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_event_always_notifies() {
        let throttle = NotifyThrottle::new(Duration::from_secs(60));
        assert!(throttle.should_notify(Instant::now()));
    }

    #[test]
    fn cooldown_boundary_is_strict() {
        let mut throttle = NotifyThrottle::new(Duration::from_secs(60));
        let t0 = Instant::now();
        let at = |s: u64| t0 + Duration::from_secs(s);

        assert!(throttle.should_notify(at(0)));
        throttle.record_success(at(0));

        assert!(!throttle.should_notify(at(30)));
        // Exactly the cooldown: suppressed.
        assert!(!throttle.should_notify(at(60)));
        assert!(throttle.should_notify(at(61)));
    }

    #[test]
    fn suppression_does_not_touch_the_record() {
        let mut throttle = NotifyThrottle::new(Duration::from_secs(60));
        let t0 = Instant::now();
        let at = |s: u64| t0 + Duration::from_secs(s);

        throttle.record_success(at(0));

        // Repeated suppressed queries leave the window anchored at t=0.
        for s in [10u64, 20, 30, 59, 60] {
            assert!(!throttle.should_notify(at(s)));
        }
        assert!(throttle.should_notify(at(61)));
    }

    #[test]
    fn record_never_moves_backwards() {
        let mut throttle = NotifyThrottle::new(Duration::from_secs(60));
        let t0 = Instant::now();
        let at = |s: u64| t0 + Duration::from_secs(s);

        throttle.record_success(at(100));
        throttle.record_success(at(50));

        // Still anchored at t=100.
        assert!(!throttle.should_notify(at(160)));
        assert!(throttle.should_notify(at(161)));
    }

    #[test]
    fn preload_arms_the_window_from_a_prior_run() {
        let mut throttle = NotifyThrottle::new(Duration::from_secs(60));
        let now = Instant::now() + Duration::from_secs(1_000);

        throttle.preload(Duration::from_secs(30), now);
        assert!(!throttle.should_notify(now));
        assert!(throttle.should_notify(now + Duration::from_secs(31)));
    }
}
