//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the JSON API under `/api`, serves uploaded profile
//! pictures from `/static/profile_pics`, serves the password reset form at
//! the mailed link, and falls back to the static landing page for every
//! other path.

pub mod account;
pub mod auth;
pub mod pages;
pub mod queues;
pub mod users;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::services::picture::MAX_UPLOAD_BYTES;
use crate::services::reset::RESET_PAGE_PATH;
use crate::state::AppState;

/// JSON API routes.
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/home", get(pages::home))
        .route("/api/about", get(pages::about))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/reset-password", post(auth::reset_request))
        .route(
            "/api/auth/reset-password/{token}",
            get(auth::reset_check).post(auth::reset_complete),
        )
        .route("/api/account", get(account::get_account).patch(account::update_account))
        .route(
            "/api/account/picture",
            put(account::upload_picture).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/users/{username}/queues", get(users::user_queues))
        .route("/api/queues", post(queues::create_queue))
        .route(
            "/api/queues/{id}",
            get(queues::get_queue)
                .patch(queues::update_queue)
                .delete(queues::delete_queue),
        )
        .route("/api/{*rest}", get(api_not_found).fallback(api_not_found))
}

/// Full application: API, profile pictures, landing page.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let profile_pics = ServeDir::new(&state.config.profile_pics_dir);
    let website = ServeDir::new(&state.config.website_dir).append_index_html_on_directories(true);
    let reset_page = ServeFile::new(state.config.website_dir.join("reset_password.html"));

    api_routes()
        .route("/healthz", get(healthz))
        .route_service(&format!("{RESET_PAGE_PATH}/{{token}}"), reset_page)
        .nest_service(account::PROFILE_PICS_PATH, profile_pics)
        .fallback_service(website)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Unknown API paths get the JSON envelope instead of the landing page.
async fn api_not_found() -> ApiError {
    ApiError::not_found()
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
