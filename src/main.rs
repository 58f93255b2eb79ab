mod config;
mod db;
mod error;
mod rate_limit;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::services::mailer::{LogMailer, Mailer, ResendMailer};

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("database init failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("profile picture directory: {0}")]
    Pictures(#[from] services::picture::PictureError),
    #[error("server io: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    // Load .env before the filter reads RUST_LOG; report the outcome once logging is up.
    let dotenv = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")))
        .init();
    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "ignoring unreadable .env"),
    }

    if let Err(e) = run().await {
        tracing::error!(error = %e, "healthqueue failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = config::AppConfig::from_env()?;
    let pool = db::init_pool(&config.database_url, config.db_max_connections).await?;
    services::picture::ensure_default_picture(&config.profile_pics_dir)?;

    let mailer: Arc<dyn Mailer> = match &config.mail {
        Some(mail) => {
            tracing::info!(from = %mail.from, "mail delivery via resend");
            Arc::new(ResendMailer::new(mail))
        }
        None => {
            tracing::warn!("RESEND_API_KEY/MAIL_FROM not set; reset links will only be logged");
            Arc::new(LogMailer)
        }
    };

    let port = config.port;
    let state = state::AppState::new(pool.clone(), config, mailer);
    let (login, reset) = (state.login_limiter.config(), state.reset_limiter.config());
    tracing::info!(
        login_per_key = login.per_key_limit,
        login_window_secs = login.window.as_secs(),
        reset_per_key = reset.per_key_limit,
        reset_window_secs = reset.window.as_secs(),
        "rate limits configured"
    );

    // Spawn background session/reset-token purge.
    let _purge = services::housekeeping::spawn_purge_task(pool);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    tracing::info!(%port, "healthqueue listening");
    axum::serve(listener, app).await?;
    Ok(())
}
