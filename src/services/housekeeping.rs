//! Housekeeping: background purge of expired credentials.
//!
//! DESIGN
//! ======
//! Sessions and reset tokens are already ignored once expired, so purging is
//! purely about table size. A failed sweep is logged and retried on the next
//! tick.

use std::time::Duration;

use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::env_parse;
use crate::services::{reset, session};

const DEFAULT_PURGE_INTERVAL_SECS: u64 = 600;

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub sessions: u64,
    pub reset_tokens: u64,
}

/// Delete expired sessions and reset tokens once.
///
/// # Errors
///
/// Returns the first database error encountered.
pub async fn purge_once(pool: &PgPool) -> Result<PurgeReport, sqlx::Error> {
    Ok(PurgeReport { sessions: session::purge_expired(pool).await?, reset_tokens: reset::purge_expired(pool).await? })
}

fn purge_interval() -> Duration {
    Duration::from_secs(env_parse("PURGE_INTERVAL_SECS", DEFAULT_PURGE_INTERVAL_SECS).max(1))
}

/// Spawn the periodic purge task. Returns a handle for shutdown.
pub fn spawn_purge_task(pool: PgPool) -> JoinHandle<()> {
    let interval = purge_interval();
    info!(interval_secs = interval.as_secs(), "credential purge configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match purge_once(&pool).await {
                Ok(report) if report == PurgeReport::default() => debug!("nothing to purge"),
                Ok(report) => info!(sessions = report.sessions, reset_tokens = report.reset_tokens, "purged expired credentials"),
                Err(e) => warn!(error = %e, "credential purge failed"),
            }
        }
    })
}

#[cfg(test)]
#[path = "housekeeping_test.rs"]
mod tests;
