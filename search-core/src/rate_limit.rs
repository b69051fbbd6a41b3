//! Per-provider rate limiting.
//!
//! The aggregator only asks two questions of a tracker: is this provider
//! throttled right now, and did a call to it just succeed. How throttling is
//! decided is up to the implementation.

use std::collections::{HashMap, VecDeque};
use std::env;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::config::{env_parse, ConfigError};

/// Default trailing window for counting calls.
pub const DEFAULT_WINDOW_SECS: u64 = 60;

/// Throttle oracle consulted before each provider call.
///
/// Both methods are called concurrently from the provider fan-out and must be
/// internally synchronized.
pub trait RateLimitTracker: Send + Sync {
    /// Whether calls to this provider should be skipped right now.
    fn is_rate_limited(&self, provider: &str) -> bool;

    /// Record a successful call to this provider.
    fn record_call(&self, provider: &str);
}

/// Rate limit ceilings.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Trailing window over which calls are counted.
    pub window: Duration,
    /// Ceiling for providers without an explicit entry. `None` means unlimited.
    pub default_limit: Option<u32>,
    /// Per-provider call ceilings within `window`.
    pub limits: HashMap<String, u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(DEFAULT_WINDOW_SECS),
            default_limit: None,
            limits: HashMap::new(),
        }
    }
}

impl RateLimitConfig {
    /// Load configuration from environment variables.
    ///
    /// - `RECIPE_SEARCH_RATE_WINDOW_SECS`: window length (default: 60)
    /// - `RECIPE_SEARCH_RATE_DEFAULT_LIMIT`: ceiling for unlisted providers (default: none)
    /// - `RECIPE_SEARCH_RATE_LIMITS`: per-provider ceilings, e.g. "spoonacular=50,edamam=10"
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(secs) = env_parse::<u64>("RECIPE_SEARCH_RATE_WINDOW_SECS")? {
            config.window = Duration::from_secs(secs);
        }
        config.default_limit = env_parse("RECIPE_SEARCH_RATE_DEFAULT_LIMIT")?;

        if let Ok(raw) = env::var("RECIPE_SEARCH_RATE_LIMITS") {
            config.limits = parse_limits(&raw).ok_or_else(|| ConfigError::InvalidValue {
                var: "RECIPE_SEARCH_RATE_LIMITS".to_string(),
                value: raw.clone(),
            })?;
        }

        Ok(config)
    }

    pub fn with_limit(mut self, provider: impl Into<String>, max_calls: u32) -> Self {
        self.limits.insert(provider.into(), max_calls);
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    fn limit_for(&self, provider: &str) -> Option<u32> {
        self.limits.get(provider).copied().or(self.default_limit)
    }
}

/// Parse "name=count,name=count". Returns `None` on any malformed entry.
fn parse_limits(raw: &str) -> Option<HashMap<String, u32>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, count) = entry.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), count.trim().parse().ok()?))
        })
        .collect()
}

/// Sliding-window call counter per provider name.
///
/// A provider is throttled once the number of successful calls recorded within
/// the trailing window reaches its ceiling.
pub struct SlidingWindowTracker {
    config: RateLimitConfig,
    /// Timestamps of recent successful calls per provider, oldest first.
    calls: DashMap<String, VecDeque<Instant>>,
}

impl SlidingWindowTracker {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            calls: DashMap::new(),
        }
    }

    /// Number of calls to this provider inside the current window.
    pub fn recent_calls(&self, provider: &str) -> usize {
        let now = Instant::now();
        match self.calls.get_mut(provider) {
            Some(mut entry) => {
                prune(&mut entry, now, self.config.window);
                entry.len()
            }
            None => 0,
        }
    }

    /// Get the number of providers we've tracked.
    pub fn tracked_providers(&self) -> usize {
        self.calls.len()
    }
}

impl Default for SlidingWindowTracker {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl RateLimitTracker for SlidingWindowTracker {
    fn is_rate_limited(&self, provider: &str) -> bool {
        let Some(limit) = self.config.limit_for(provider) else {
            return false;
        };
        self.recent_calls(provider) >= limit as usize
    }

    fn record_call(&self, provider: &str) {
        let now = Instant::now();
        let mut entry = self.calls.entry(provider.to_string()).or_default();
        prune(&mut entry, now, self.config.window);
        entry.push_back(now);
    }
}

fn prune(calls: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = calls.front() {
        if now.duration_since(oldest) >= window {
            calls.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_throttles_at_ceiling() {
        let tracker = SlidingWindowTracker::new(RateLimitConfig::default().with_limit("api", 2));

        assert!(!tracker.is_rate_limited("api"));
        tracker.record_call("api");
        assert!(!tracker.is_rate_limited("api"));
        tracker.record_call("api");
        assert!(tracker.is_rate_limited("api"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expires_old_calls() {
        let config = RateLimitConfig::default()
            .with_limit("api", 1)
            .with_window(Duration::from_secs(10));
        let tracker = SlidingWindowTracker::new(config);

        tracker.record_call("api");
        assert!(tracker.is_rate_limited("api"));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(tracker.is_rate_limited("api"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!tracker.is_rate_limited("api"));
        assert_eq!(tracker.recent_calls("api"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlimited_without_ceiling() {
        let tracker = SlidingWindowTracker::default();
        for _ in 0..100 {
            tracker.record_call("catalog");
        }
        assert!(!tracker.is_rate_limited("catalog"));
        assert_eq!(tracker.recent_calls("catalog"), 100);
        assert_eq!(tracker.tracked_providers(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_limit_applies_to_unlisted() {
        let config = RateLimitConfig {
            default_limit: Some(1),
            ..Default::default()
        }
        .with_limit("generous", 5);
        let tracker = SlidingWindowTracker::new(config);

        tracker.record_call("other");
        tracker.record_call("generous");
        assert!(tracker.is_rate_limited("other"));
        assert!(!tracker.is_rate_limited("generous"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_record_calls() {
        let tracker = Arc::new(SlidingWindowTracker::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                tokio::spawn(async move {
                    for _ in 0..50 {
                        tracker.record_call("shared");
                        let _ = tracker.is_rate_limited("shared");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(tracker.recent_calls("shared"), 400);
    }

    #[test]
    fn test_parse_limits() {
        let limits = parse_limits("spoonacular=50, edamam = 10").unwrap();
        assert_eq!(limits.get("spoonacular"), Some(&50));
        assert_eq!(limits.get("edamam"), Some(&10));
        assert!(parse_limits("spoonacular").is_none());
        assert!(parse_limits("=3").is_none());
        assert!(parse_limits("a=x").is_none());
        assert_eq!(parse_limits("").map(|l| l.len()), Some(0));
    }
}
