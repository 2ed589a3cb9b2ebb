//! ---
//! fleetsim_section: "07-diagnosis-resilience"
//! fleetsim_subsection: "module"
//! fleetsim_type: "source"
//! fleetsim_scope: "code"
//! fleetsim_description: "Sliding-window rate limiting for enrichment calls."
//! fleetsim_version: "v0.0.0-prealpha"
//! fleetsim_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Window length the call budget applies to.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Calls allowed inside one window.
pub const RATE_LIMIT_MAX_CALLS: usize = 50;

/// Process-wide sliding window over successful call timestamps. A call over
/// the cap fails immediately with a suggested wait rather than queueing.
/// Only successful calls consume window slots; [`SlidingWindowLimiter::record`]
/// is invoked by the client after the provider answered.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_calls: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    /// Limiter admitting `max_calls` per `window`.
    pub fn new(max_calls: usize, window: Duration) -> Self {
        Self {
            max_calls,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    /// Check whether another call may proceed right now. Does not consume a
    /// slot. On rejection returns the wait until the oldest recorded call
    /// leaves the window.
    pub fn check(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut timestamps = self.timestamps.lock();
        Self::evict(&mut timestamps, now, self.window);
        if timestamps.len() < self.max_calls {
            return Ok(());
        }
        let oldest = timestamps.front().copied().unwrap_or(now);
        Err((oldest + self.window).duration_since(now))
    }

    /// Record a completed call at the current instant.
    pub fn record(&self) {
        let now = Instant::now();
        let mut timestamps = self.timestamps.lock();
        Self::evict(&mut timestamps, now, self.window);
        timestamps.push_back(now);
    }

    /// Number of recorded calls still inside the window.
    pub fn in_window(&self) -> usize {
        let now = Instant::now();
        let mut timestamps = self.timestamps.lock();
        Self::evict(&mut timestamps, now, self.window);
        timestamps.len()
    }

    fn evict(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) >= window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn checks_do_not_consume_slots() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(60));
        for _ in 0..10 {
            assert!(limiter.check().is_ok());
        }
        assert_eq!(limiter.in_window(), 0);
    }

    #[tokio::test]
    async fn cap_is_enforced_with_a_suggested_wait() {
        let limiter = SlidingWindowLimiter::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.check().is_ok());
            limiter.record();
        }
        let retry_after = limiter.check().unwrap_err();
        assert!(retry_after <= Duration::from_secs(60));
        assert!(retry_after > Duration::from_secs(55));
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides_open_again() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(60));
        limiter.record();
        limiter.record();
        assert!(limiter.check().is_err());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.check().is_ok());
        assert_eq!(limiter.in_window(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_eviction_frees_exactly_expired_slots() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(60));
        limiter.record();
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.record();
        assert!(limiter.check().is_err());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(limiter.check().is_ok());
        assert_eq!(limiter.in_window(), 1);
    }
}
