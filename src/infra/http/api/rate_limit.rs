use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const METRIC_RATE_LIMITED: &str = "vor_api_rate_limited_total";

/// Sliding-window limiter keyed by API key id.
#[derive(Debug, Clone)]
pub struct ApiRateLimiter {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
}

impl ApiRateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: Arc::new(DashMap::new()),
        }
    }

    /// Records a request for `key` and returns whether it is allowed along with
    /// the number of requests left in the current window.
    pub fn allow(&self, key: &str) -> (bool, u32) {
        self.allow_at(key, Instant::now())
    }

    fn allow_at(&self, key: &str, now: Instant) -> (bool, u32) {
        let window = self.window;
        let mut entry = self.buckets.entry(key.to_string()).or_default();
        entry.retain(|instant| now.saturating_duration_since(*instant) < window);

        let used = u32::try_from(entry.len()).unwrap_or(u32::MAX);
        let remaining = self.max_requests.saturating_sub(used);
        if remaining == 0 {
            return (false, 0);
        }

        entry.push(now);
        (true, remaining - 1)
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }

    pub fn limit(&self) -> u32 {
        self.max_requests
    }
}
