//! Per-client request limiter
//!
//! Sliding window over request instants, keyed by client IP. Guards the
//! contact form and the admin login against bursts before any heavier work
//! (CAPTCHA round trip, password hashing) happens.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Number of tracked keys above which stale keys are swept on insert
const SWEEP_THRESHOLD: usize = 1024;

pub struct RequestLimiter {
    /// Request instants per key inside the current window
    requests: DashMap<String, Vec<Instant>>,
    window: Duration,
    max_requests: u32,
}

impl RequestLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            requests: DashMap::new(),
            window,
            max_requests,
        }
    }

    /// `max_requests` per minute
    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(Duration::from_secs(60), max_requests)
    }

    /// Check if a request is allowed and record it
    pub fn check_and_record(&self, key: &str) -> bool {
        self.check_and_record_at(key, Instant::now())
    }

    pub fn check_and_record_at(&self, key: &str, now: Instant) -> bool {
        if self.requests.len() > SWEEP_THRESHOLD {
            self.cleanup_at(now);
        }

        let mut entry = self.requests.entry(key.to_string()).or_default();
        entry.retain(|&t| now.saturating_duration_since(t) < self.window);

        if entry.len() >= self.max_requests as usize {
            debug!(key, "Request limit reached");
            return false;
        }

        entry.push(now);
        true
    }

    /// Drop keys with no requests left in the window
    pub fn cleanup_at(&self, now: Instant) {
        self.requests.retain(|_, instants| {
            instants.retain(|&t| now.saturating_duration_since(t) < self.window);
            !instants.is_empty()
        });
    }

    pub fn tracked_keys(&self) -> usize {
        self.requests.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eleventh_request_in_a_minute_is_refused() {
        let limiter = RequestLimiter::per_minute(10);
        let start = Instant::now();

        for i in 0..10 {
            assert!(limiter.check_and_record_at("1.2.3.4", start + Duration::from_secs(i)));
        }
        assert!(!limiter.check_and_record_at("1.2.3.4", start + Duration::from_secs(10)));

        // Other clients are unaffected
        assert!(limiter.check_and_record_at("5.6.7.8", start + Duration::from_secs(10)));
    }

    #[test]
    fn test_window_slides() {
        let limiter = RequestLimiter::per_minute(2);
        let start = Instant::now();

        assert!(limiter.check_and_record_at("ip", start));
        assert!(limiter.check_and_record_at("ip", start + Duration::from_secs(30)));
        assert!(!limiter.check_and_record_at("ip", start + Duration::from_secs(59)));

        // The first request has left the window
        assert!(limiter.check_and_record_at("ip", start + Duration::from_secs(61)));
    }

    #[test]
    fn test_cleanup_drops_idle_keys() {
        let limiter = RequestLimiter::per_minute(5);
        let start = Instant::now();

        limiter.check_and_record_at("a", start);
        limiter.check_and_record_at("b", start + Duration::from_secs(50));
        limiter.cleanup_at(start + Duration::from_secs(70));

        assert_eq!(limiter.tracked_keys(), 1);
    }
}
