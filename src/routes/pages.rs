//! Home feed and about page.

use axum::extract::{Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::services::pagination::{Page, PageRequest};
use crate::services::queue::{self, QueueEntry, QueueError};
use crate::state::AppState;

pub const APP_NAME: &str = "Health Queue";
pub const APP_DESCRIPTION: &str =
    "Queue patients for examinations, track who is waiting, and keep the line moving.";

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

/// `GET /api/home?page=N`: every queue entry, newest first.
pub async fn home(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<QueueEntry>>, ApiError> {
    let request = PageRequest::parse(query.page).map_err(QueueError::from)?;
    Ok(Json(queue::list_queues(&state.pool, request).await?))
}

#[derive(Debug, Serialize)]
pub struct About {
    pub title: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// `GET /api/about`
pub async fn about() -> Json<About> {
    Json(About { title: "About", name: APP_NAME, description: APP_DESCRIPTION })
}
