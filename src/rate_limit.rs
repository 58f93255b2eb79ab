//! In-memory rate limiting for credential and mail endpoints.
//!
//! DESIGN
//! ======
//! Sliding-window counters backed by `HashMap<String, VecDeque<Instant>>`.
//! Two limits are enforced per limiter:
//! - Per-key (normalized email): bounds guessing against one account
//! - Global: bounds total throughput of the guarded endpoint
//!
//! Login and password-reset requests use separate limiters so a burst of
//! reset mails cannot lock users out of signing in.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::env_parse;

const DEFAULT_LOGIN_PER_KEY_LIMIT: usize = 10;
const DEFAULT_LOGIN_GLOBAL_LIMIT: usize = 300;
const DEFAULT_LOGIN_WINDOW_SECS: u64 = 300;

const DEFAULT_RESET_PER_KEY_LIMIT: usize = 3;
const DEFAULT_RESET_GLOBAL_LIMIT: usize = 60;
const DEFAULT_RESET_WINDOW_SECS: u64 = 900;

/// Upper bound on tracked keys before stale ones are swept.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub per_key_limit: usize,
    pub global_limit: usize,
    pub window: Duration,
}

impl RateLimitConfig {
    /// Login limits from `RATE_LIMIT_LOGIN_*`.
    #[must_use]
    pub fn login_from_env() -> Self {
        Self {
            per_key_limit: env_parse("RATE_LIMIT_LOGIN_PER_KEY", DEFAULT_LOGIN_PER_KEY_LIMIT),
            global_limit: env_parse("RATE_LIMIT_LOGIN_GLOBAL", DEFAULT_LOGIN_GLOBAL_LIMIT),
            window: Duration::from_secs(env_parse("RATE_LIMIT_LOGIN_WINDOW_SECS", DEFAULT_LOGIN_WINDOW_SECS)),
        }
    }

    /// Password reset limits from `RATE_LIMIT_RESET_*`.
    #[must_use]
    pub fn reset_from_env() -> Self {
        Self {
            per_key_limit: env_parse("RATE_LIMIT_RESET_PER_KEY", DEFAULT_RESET_PER_KEY_LIMIT),
            global_limit: env_parse("RATE_LIMIT_RESET_GLOBAL", DEFAULT_RESET_GLOBAL_LIMIT),
            window: Duration::from_secs(env_parse("RATE_LIMIT_RESET_WINDOW_SECS", DEFAULT_RESET_WINDOW_SECS)),
        }
    }
}

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("too many attempts for this account (max {limit} per {window_secs}s)")]
    PerKeyExceeded { limit: usize, window_secs: u64 },
    #[error("too many requests (max {limit} per {window_secs}s)")]
    GlobalExceeded { limit: usize, window_secs: u64 },
}

// =============================================================================
// RATE LIMITER
// =============================================================================

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<RateLimiterInner>>,
    config: RateLimitConfig,
}

#[derive(Default)]
struct RateLimiterInner {
    per_key: HashMap<String, VecDeque<Instant>>,
    global: VecDeque<Instant>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self { inner: Arc::new(Mutex::new(RateLimiterInner::default())), config }
    }

    #[must_use]
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Check both limits for `key`, then record the attempt.
    ///
    /// # Errors
    ///
    /// Returns which limit was exceeded; nothing is recorded in that case.
    pub fn check_and_record(&self, key: &str) -> Result<(), RateLimitError> {
        self.check_and_record_at(key, Instant::now())
    }

    fn check_and_record_at(&self, key: &str, now: Instant) -> Result<(), RateLimitError> {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let inner = &mut *guard;
        let cfg = self.config;

        prune_window(&mut inner.global, now, cfg.window);
        if inner.global.len() >= cfg.global_limit {
            return Err(RateLimitError::GlobalExceeded { limit: cfg.global_limit, window_secs: cfg.window.as_secs() });
        }

        if inner.per_key.len() >= SWEEP_THRESHOLD {
            inner.per_key.retain(|_, deque| {
                prune_window(deque, now, cfg.window);
                !deque.is_empty()
            });
        }

        let key_deque = inner.per_key.entry(key.to_owned()).or_default();
        prune_window(key_deque, now, cfg.window);
        if key_deque.len() >= cfg.per_key_limit {
            return Err(RateLimitError::PerKeyExceeded {
                limit: cfg.per_key_limit,
                window_secs: cfg.window.as_secs(),
            });
        }

        key_deque.push_back(now);
        inner.global.push_back(now);
        Ok(())
    }

    /// Forget a key's history, e.g. after a successful login.
    pub fn reset_key(&self, key: &str) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.per_key.remove(key);
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .per_key
            .len()
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.duration_since(front) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
