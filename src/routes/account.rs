//! Account routes for the signed-in user.

use axum::body::Bytes;
use axum::extract::State;
use axum::response::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::routes::auth::AuthUser;
use crate::services::account::{self, AccountForm, User};
use crate::services::picture;
use crate::state::AppState;

/// URL path prefix under which profile pictures are served.
pub const PROFILE_PICS_PATH: &str = "/static/profile_pics";

#[must_use]
pub fn image_url(image_file: &str) -> String {
    format!("{PROFILE_PICS_PATH}/{image_file}")
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    #[serde(flatten)]
    pub user: User,
    pub image_url: String,
}

impl From<User> for AccountResponse {
    fn from(user: User) -> Self {
        let image_url = image_url(&user.image_file);
        Self { user, image_url }
    }
}

/// `GET /api/account`
pub async fn get_account(State(state): State<AppState>, auth: AuthUser) -> Result<Json<AccountResponse>, ApiError> {
    let user = account::find_by_id(&state.pool, auth.user.id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(user.into()))
}

/// `PATCH /api/account`: change username and email.
pub async fn update_account(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(form): Json<AccountForm>,
) -> Result<Json<AccountResponse>, ApiError> {
    let user = account::update_account(&state.pool, auth.user.id, &form).await?;
    tracing::info!(user_id = %user.id, "account updated");
    Ok(Json(user.into()))
}

/// `PUT /api/account/picture`: raw JPEG or PNG body.
pub async fn upload_picture(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Bytes,
) -> Result<Json<AccountResponse>, ApiError> {
    let filename = picture::save_picture(&state.config.profile_pics_dir, body.to_vec()).await?;
    let user = account::set_image_file(&state.pool, auth.user.id, &filename)
        .await?
        .ok_or_else(ApiError::not_found)?;
    tracing::info!(user_id = %user.id, image_file = %filename, "profile picture updated");
    Ok(Json(user.into()))
}

#[cfg(test)]
#[path = "account_test.rs"]
mod tests;
