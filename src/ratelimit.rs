// src/ratelimit.rs
//! Per-client throttle for lookups that keep failing.
//!
//! Only fresh lookups that end with an error are counted. Counters decay a
//! fixed window after the first failure, so a client is never banned for good.

use dashmap::DashMap;
use governor::{ Quota, RateLimiter, clock::DefaultClock };
use governor::state::keyed::DefaultKeyedStateStore;
use std::time::{Duration, Instant};

struct FailureCounter {
    count: u32,
    window_start: Instant,
}

impl FailureCounter {
    fn is_expired(&self, decay: Duration, now: Instant) -> bool {
        now.duration_since(self.window_start) >= decay
    }
}

/// Result of a throttle check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleDecision {
    pub throttle: bool,
    pub count: u32,
    /// Backoff hint in threshold multiples (`count / threshold`).
    pub try_after: u32,
}

pub struct FailureLimiter {
    counters: DashMap<String, FailureCounter>,
    threshold: u32,
    decay: Duration,
}

impl FailureLimiter {
    pub fn new(threshold: u32, decay: Duration) -> Self {
        Self {
            counters: DashMap::new(),
            threshold: threshold.max(1),
            decay,
        }
    }

    pub fn current(&self, client_id: &str) -> u32 {
        let now = Instant::now();
        self.counters
            .get(client_id)
            .filter(|counter| !counter.is_expired(self.decay, now))
            .map(|counter| counter.count)
            .unwrap_or(0)
    }

    pub fn should_throttle(&self, client_id: &str) -> ThrottleDecision {
        let count = self.current(client_id);
        ThrottleDecision {
            throttle: count > self.threshold,
            count,
            try_after: count / self.threshold,
        }
    }

    /// Counts one failed fresh lookup, returning the new count.
    pub fn record_failure(&self, client_id: &str) -> u32 {
        let now = Instant::now();
        let mut counter = self
            .counters
            .entry(client_id.to_string())
            .or_insert_with(|| FailureCounter { count: 0, window_start: now });

        if counter.is_expired(self.decay, now) {
            counter.count = 0;
            counter.window_start = now;
        }
        counter.count = counter.count.saturating_add(1);
        counter.count
    }

    pub fn reset(&self, client_id: &str) {
        self.counters.remove(client_id);
    }

    /// Drops decayed counters, returning how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.counters.len();
        self.counters.retain(|_, counter| !counter.is_expired(self.decay, now));
        before.saturating_sub(self.counters.len())
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }
}

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Plain request quota on the query route, independent of lookup outcomes.
pub struct RequestQuota {
    limiter: Option<KeyedLimiter>,
}

impl RequestQuota {
    pub fn new(quota: Option<Quota>) -> Self {
        Self {
            limiter: quota.map(RateLimiter::keyed),
        }
    }

    pub fn disabled() -> Self {
        Self { limiter: None }
    }

    pub fn check(&self, key: &str) -> bool {
        match &self.limiter {
            Some(limiter) => limiter.check_key(&key.to_string()).is_ok(),
            None => true,
        }
    }

    pub fn retain_recent(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.retain_recent();
        }
    }
}
