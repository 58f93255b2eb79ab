//! Environment-driven configuration.
//!
//! DESIGN
//! ======
//! Every knob is read once at startup into typed structs. Optional subsystems
//! (outbound mail) resolve to `None` when their variables are absent so the
//! service still boots for local development.

use std::ops::RangeInclusive;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;
/// Work factors bcrypt accepts.
const BCRYPT_COST_RANGE: RangeInclusive<u32> = 4..=31;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} required")]
    Missing(&'static str),
    #[error("invalid {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Outbound mail settings for password reset messages.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub resend_api_key: String,
    pub from: String,
}

impl MailConfig {
    /// Load from `RESEND_API_KEY` and `MAIL_FROM`.
    /// Returns `None` if either is missing or blank (mail delivery disabled).
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let resend_api_key = env_non_empty("RESEND_API_KEY")?;
        let from = env_non_empty("MAIL_FROM")?;
        Some(Self { resend_api_key, from })
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    /// Absolute origin used to build links sent by mail, without trailing slash.
    pub public_base_url: String,
    pub website_dir: PathBuf,
    pub profile_pics_dir: PathBuf,
    pub db_max_connections: u32,
    pub bcrypt_cost: u32,
    pub cookie_secure: bool,
    pub mail: Option<MailConfig>,
}

impl AppConfig {
    /// Build the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing, `PORT` does not parse,
    /// or `BCRYPT_COST` is outside 4..=31.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env_non_empty("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { key: "PORT", value: raw })?,
            Err(_) => DEFAULT_PORT,
        };

        let public_base_url = env_non_empty("PUBLIC_BASE_URL")
            .map_or_else(|| format!("http://localhost:{port}"), |url| url.trim_end_matches('/').to_owned());
        let cookie_secure = env_bool("COOKIE_SECURE").unwrap_or_else(|| public_base_url.starts_with("https://"));

        Ok(Self {
            database_url,
            port,
            public_base_url,
            website_dir: env_path("WEBSITE_DIR", "website"),
            profile_pics_dir: env_path("PROFILE_PICS_DIR", "data/profile_pics"),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            bcrypt_cost: match std::env::var("BCRYPT_COST") {
                Ok(raw) => parse_bcrypt_cost(&raw)?,
                Err(_) => DEFAULT_BCRYPT_COST,
            },
            cookie_secure,
            mail: MailConfig::from_env(),
        })
    }
}

fn parse_bcrypt_cost(raw: &str) -> Result<u32, ConfigError> {
    match raw.trim().parse::<u32>() {
        Ok(cost) if BCRYPT_COST_RANGE.contains(&cost) => Ok(cost),
        _ => Err(ConfigError::Invalid { key: "BCRYPT_COST", value: raw.to_owned() }),
    }
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

/// Parse `key`, falling back to `default` when it is unset or unparsable.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    let Ok(raw) = std::env::var(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable setting, using default");
            default
        }
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn env_path(key: &str, default: &str) -> PathBuf {
    env_non_empty(key).map_or_else(|| PathBuf::from(default), PathBuf::from)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
