//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the database pool, the loaded configuration, the outbound
//! mailer and the rate limiters guarding credential endpoints.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::services::mailer::Mailer;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub mailer: Arc<dyn Mailer>,
    /// Guards `POST /api/auth/login`, keyed by normalized email.
    pub login_limiter: RateLimiter,
    /// Guards `POST /api/auth/reset-password`, keyed by normalized email.
    pub reset_limiter: RateLimiter,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, config: AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self::with_limits(pool, config, mailer, RateLimitConfig::login_from_env(), RateLimitConfig::reset_from_env())
    }

    #[must_use]
    pub fn with_limits(
        pool: PgPool,
        config: AppConfig,
        mailer: Arc<dyn Mailer>,
        login: RateLimitConfig,
        reset: RateLimitConfig,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            mailer,
            login_limiter: RateLimiter::new(login),
            reset_limiter: RateLimiter::new(reset),
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
#[path = "state_helpers_test.rs"]
pub mod test_helpers;
