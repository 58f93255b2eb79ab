//! Public user profile routes.

use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::routes::account::image_url;
use crate::routes::pages::PageQuery;
use crate::services::account;
use crate::services::pagination::{Page, PageRequest};
use crate::services::queue::{self, QueueEntry, QueueError};
use crate::state::AppState;

/// Public view of a user. Email stays private.
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub username: String,
    pub image_url: String,
}

#[derive(Debug, Serialize)]
pub struct UserQueuesResponse {
    pub user: UserProfile,
    pub queues: Page<QueueEntry>,
}

/// `GET /api/users/{username}/queues?page=N`: entries authored by one user.
pub async fn user_queues(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<UserQueuesResponse>, ApiError> {
    let request = PageRequest::parse(query.page).map_err(QueueError::from)?;
    let user = account::find_by_username(&state.pool, &username)
        .await?
        .ok_or_else(ApiError::not_found)?;

    let queues = queue::list_user_queues(&state.pool, user.id, request).await?;
    Ok(Json(UserQueuesResponse {
        user: UserProfile { image_url: image_url(&user.image_file), username: user.username },
        queues,
    }))
}
