use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use crate::auth::Caller;
use crate::config::ServerPolicy;
use crate::response::ApiError;

/// Sliding-window request counter keyed by an identifier.
pub(crate) struct RateLimiter {
    limit: usize,
    window: Duration,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub(crate) fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Counts the request, or returns how long until the oldest hit leaves
    /// the window. Rejected requests are not counted.
    pub(crate) fn check(&self, key: &str, now: Instant) -> Result<(), Duration> {
        let mut hits = self.hits.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = hits.entry(key.to_string()).or_default();
        while entry
            .front()
            .is_some_and(|hit| now.saturating_duration_since(*hit) >= self.window)
        {
            entry.pop_front();
        }

        if entry.len() >= self.limit {
            let oldest = entry.front().copied().unwrap_or(now);
            return Err(self
                .window
                .saturating_sub(now.saturating_duration_since(oldest)));
        }
        entry.push_back(now);
        Ok(())
    }

    /// Drops identifiers with no hits inside the window. Returns how many.
    pub(crate) fn prune(&self, now: Instant) -> usize {
        let mut hits = self.hits.lock().unwrap_or_else(PoisonError::into_inner);
        let before = hits.len();
        hits.retain(|_, entry| {
            entry
                .back()
                .is_some_and(|hit| now.saturating_duration_since(*hit) < self.window)
        });
        before - hits.len()
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.hits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

pub(crate) struct RateLimits {
    pub(crate) per_user: RateLimiter,
    pub(crate) per_ip: RateLimiter,
}

impl RateLimits {
    pub(crate) fn new(policy: &ServerPolicy) -> Self {
        Self {
            per_user: RateLimiter::new(policy.user_rate_limit, policy.rate_limit_window()),
            per_ip: RateLimiter::new(policy.ip_rate_limit, policy.rate_limit_window()),
        }
    }

    pub(crate) fn check(&self, caller: &Caller, now: Instant) -> Result<(), ApiError> {
        let exhausted = |scope: &str, retry: Duration| {
            tracing::warn!(
                user_id = %caller.user_id,
                ip = %caller.ip,
                scope,
                retry_after_secs = retry.as_secs(),
                "rate limit exceeded"
            );
            ApiError::ResourceExhausted(format!(
                "too many requests; retry in {}s",
                retry.as_secs().max(1)
            ))
        };
        self.per_ip
            .check(&caller.ip, now)
            .map_err(|retry| exhausted("ip", retry))?;
        self.per_user
            .check(&caller.user_id, now)
            .map_err(|retry| exhausted("user", retry))
    }

    pub(crate) fn prune(&self, now: Instant) -> usize {
        self.per_user.prune(now) + self.per_ip.prune(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_within_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let start = Instant::now();
        for i in 0..3 {
            assert!(limiter.check("u", start + Duration::from_secs(i)).is_ok());
        }
        let retry = limiter
            .check("u", start + Duration::from_secs(10))
            .unwrap_err();
        assert_eq!(retry, Duration::from_secs(50));
        // Another identifier has its own budget.
        assert!(limiter.check("v", start + Duration::from_secs(10)).is_ok());
    }

    #[test]
    fn window_slides() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();
        limiter.check("u", start).unwrap();
        limiter.check("u", start + Duration::from_secs(30)).unwrap();
        assert!(limiter.check("u", start + Duration::from_secs(59)).is_err());
        // The first hit has left the window.
        assert!(limiter.check("u", start + Duration::from_secs(60)).is_ok());
        assert!(limiter.check("u", start + Duration::from_secs(61)).is_err());
    }

    #[test]
    fn prune_drops_idle_keys() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let start = Instant::now();
        limiter.check("old", start).unwrap();
        limiter.check("fresh", start + Duration::from_secs(100)).unwrap();
        assert_eq!(limiter.prune(start + Duration::from_secs(120)), 1);
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn caller_checked_per_ip_and_user() {
        let policy = ServerPolicy {
            user_rate_limit: 1,
            ..ServerPolicy::default()
        };
        let limits = RateLimits::new(&policy);
        let caller = Caller {
            user_id: "u".to_string(),
            device_id: "d".to_string(),
            ip: "10.0.0.1".to_string(),
        };
        let now = Instant::now();
        assert!(limits.check(&caller, now).is_ok());
        assert!(matches!(
            limits.check(&caller, now),
            Err(ApiError::ResourceExhausted(_))
        ));
    }
}
