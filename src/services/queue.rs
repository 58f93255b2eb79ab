//! Queue service: patients queued for examinations.
//!
//! DESIGN
//! ======
//! A queue entry records one patient (`title`) and the examinations they
//! need (`content`), authored by the signed-in staff member. Only the author
//! may edit or delete an entry. `date_queued` is stamped on insert and never
//! rewritten, so edits do not reorder the listing.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::FieldErrors;
use crate::services::account::MSG_REQUIRED;
use crate::services::pagination::{Page, PageOutOfRange, PageRequest};

pub const TITLE_MAX_LEN: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue not found: {0}")]
    NotFound(Uuid),
    #[error("queue {0} belongs to another user")]
    Forbidden(Uuid),
    #[error("invalid queue form")]
    Invalid(FieldErrors),
    #[error(transparent)]
    Page(#[from] PageOutOfRange),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct QueueForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// Author summary embedded in each queue entry.
#[derive(Debug, Clone, Serialize)]
pub struct QueueAuthor {
    pub id: Uuid,
    pub username: String,
    pub image_file: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date_queued: OffsetDateTime,
    pub author: QueueAuthor,
}

/// Trimmed, validated form values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidQueue {
    pub title: String,
    pub content: String,
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Validate a queue form. The title is the patient's name, the content lists
/// the requested examinations; both are required.
///
/// # Errors
///
/// Returns every field that failed validation.
pub fn validate_queue_form(form: &QueueForm) -> Result<ValidQueue, FieldErrors> {
    let mut errors = FieldErrors::new();
    let title = form.title.trim();
    let content = form.content.trim();

    if title.is_empty() {
        errors.add("title", MSG_REQUIRED);
    } else if title.chars().count() > TITLE_MAX_LEN {
        errors.add("title", format!("Field cannot be longer than {TITLE_MAX_LEN} characters."));
    }
    if content.is_empty() {
        errors.add("content", MSG_REQUIRED);
    }

    errors.into_result()?;
    Ok(ValidQueue { title: title.to_owned(), content: content.to_owned() })
}

// =============================================================================
// QUERIES
// =============================================================================

const ENTRY_SELECT: &str = "SELECT q.id, q.title, q.content, q.date_queued, q.user_id, u.username, u.image_file
     FROM queues q
     JOIN users u ON u.id = q.user_id";

fn entry_from_row(row: &sqlx::postgres::PgRow) -> QueueEntry {
    QueueEntry {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        date_queued: row.get("date_queued"),
        author: QueueAuthor {
            id: row.get("user_id"),
            username: row.get("username"),
            image_file: row.get("image_file"),
        },
    }
}

/// Queue a patient on behalf of `author_id`.
///
/// # Errors
///
/// `Invalid` for missing fields, `Database` on insert failure.
pub async fn create_queue(pool: &PgPool, author_id: Uuid, form: &QueueForm) -> Result<QueueEntry, QueueError> {
    let valid = validate_queue_form(form).map_err(QueueError::Invalid)?;
    let id = Uuid::new_v4();

    sqlx::query("INSERT INTO queues (id, title, content, user_id) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(&valid.title)
        .bind(&valid.content)
        .bind(author_id)
        .execute(pool)
        .await?;

    tracing::info!(queue_id = %id, user_id = %author_id, "queue created");
    get_queue(pool, id).await
}

/// Fetch one queue entry with its author.
///
/// # Errors
///
/// `NotFound` if no entry has this ID.
pub async fn get_queue(pool: &PgPool, queue_id: Uuid) -> Result<QueueEntry, QueueError> {
    let row = sqlx::query(&format!("{ENTRY_SELECT} WHERE q.id = $1"))
        .bind(queue_id)
        .fetch_optional(pool)
        .await?
        .ok_or(QueueError::NotFound(queue_id))?;
    Ok(entry_from_row(&row))
}

/// Resolve the author of an entry, distinguishing missing from foreign.
async fn ensure_author(pool: &PgPool, queue_id: Uuid, user_id: Uuid) -> Result<(), QueueError> {
    let author: Option<Uuid> = sqlx::query_scalar("SELECT user_id FROM queues WHERE id = $1")
        .bind(queue_id)
        .fetch_optional(pool)
        .await?;
    match author {
        None => Err(QueueError::NotFound(queue_id)),
        Some(author) if author != user_id => Err(QueueError::Forbidden(queue_id)),
        Some(_) => Ok(()),
    }
}

/// Edit the patient name and examinations of an entry the caller authored.
///
/// # Errors
///
/// `NotFound`, `Forbidden` for non-authors, or `Invalid` form data.
pub async fn update_queue(
    pool: &PgPool,
    queue_id: Uuid,
    user_id: Uuid,
    form: &QueueForm,
) -> Result<QueueEntry, QueueError> {
    ensure_author(pool, queue_id, user_id).await?;
    let valid = validate_queue_form(form).map_err(QueueError::Invalid)?;

    let result = sqlx::query("UPDATE queues SET title = $3, content = $4 WHERE id = $1 AND user_id = $2")
        .bind(queue_id)
        .bind(user_id)
        .bind(&valid.title)
        .bind(&valid.content)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(QueueError::NotFound(queue_id));
    }

    tracing::info!(%queue_id, %user_id, "queue updated");
    get_queue(pool, queue_id).await
}

/// Delete an entry the caller authored.
///
/// # Errors
///
/// `NotFound`, or `Forbidden` for non-authors.
pub async fn delete_queue(pool: &PgPool, queue_id: Uuid, user_id: Uuid) -> Result<(), QueueError> {
    ensure_author(pool, queue_id, user_id).await?;

    let result = sqlx::query("DELETE FROM queues WHERE id = $1 AND user_id = $2")
        .bind(queue_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(QueueError::NotFound(queue_id));
    }

    tracing::info!(%queue_id, %user_id, "queue deleted");
    Ok(())
}

/// All entries, newest first.
///
/// # Errors
///
/// `Page` when the requested page is past the end.
pub async fn list_queues(pool: &PgPool, request: PageRequest) -> Result<Page<QueueEntry>, QueueError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queues")
        .fetch_one(pool)
        .await?;
    let rows = sqlx::query(&format!(
        "{ENTRY_SELECT} ORDER BY q.date_queued DESC, q.id DESC LIMIT $1 OFFSET $2"
    ))
    .bind(request.limit())
    .bind(request.offset())
    .fetch_all(pool)
    .await?;

    Ok(Page::new(request, rows.iter().map(entry_from_row).collect(), total)?)
}

/// Entries authored by one user, newest first.
///
/// # Errors
///
/// `Page` when the requested page is past the end.
pub async fn list_user_queues(
    pool: &PgPool,
    user_id: Uuid,
    request: PageRequest,
) -> Result<Page<QueueEntry>, QueueError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queues WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    let rows = sqlx::query(&format!(
        "{ENTRY_SELECT} WHERE q.user_id = $1 ORDER BY q.date_queued DESC, q.id DESC LIMIT $2 OFFSET $3"
    ))
    .bind(user_id)
    .bind(request.limit())
    .bind(request.offset())
    .fetch_all(pool)
    .await?;

    Ok(Page::new(request, rows.iter().map(entry_from_row).collect(), total)?)
}

#[cfg(test)]
#[path = "queue_test.rs"]
mod tests;
