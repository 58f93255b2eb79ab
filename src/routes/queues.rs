//! Queue entry routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::auth::AuthUser;
use crate::services::queue::{self, QueueEntry, QueueForm};
use crate::state::AppState;

/// `POST /api/queues`: queue a patient.
pub async fn create_queue(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(form): Json<QueueForm>,
) -> Result<(StatusCode, Json<QueueEntry>), ApiError> {
    let entry = queue::create_queue(&state.pool, auth.user.id, &form).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// `GET /api/queues/{id}`
pub async fn get_queue(
    State(state): State<AppState>,
    Path(queue_id): Path<Uuid>,
) -> Result<Json<QueueEntry>, ApiError> {
    Ok(Json(queue::get_queue(&state.pool, queue_id).await?))
}

/// `PATCH /api/queues/{id}`: author only.
pub async fn update_queue(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(queue_id): Path<Uuid>,
    Json(form): Json<QueueForm>,
) -> Result<Json<QueueEntry>, ApiError> {
    Ok(Json(queue::update_queue(&state.pool, queue_id, auth.user.id, &form).await?))
}

/// `DELETE /api/queues/{id}`: author only.
pub async fn delete_queue(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(queue_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    queue::delete_queue(&state.pool, queue_id, auth.user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
