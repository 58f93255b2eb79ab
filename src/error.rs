//! HTTP error envelope shared by all route handlers.
//!
//! Every failure leaves the service as `{ "code", "message", "fields"? }`
//! with a matching status. Service errors are translated here so handlers
//! can use `?` directly.

use std::collections::BTreeMap;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::rate_limit::RateLimitError;
use crate::services::account::AccountError;
use crate::services::mailer::MailError;
use crate::services::picture::PictureError;
use crate::services::queue::QueueError;
use crate::services::reset::{self, ResetError};

pub const MSG_LOGIN_FAILED: &str = "Login Unsuccessful. Please check email and password";
pub const MSG_PICTURE_FORMAT: &str = "File does not have an approved extension: jpg, png";

/// Field name -> human-readable messages, in stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_owned()).or_default().push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// `Ok(())` when nothing was recorded, otherwise the collected errors.
    ///
    /// # Errors
    ///
    /// Returns `self` if any field failed validation.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a FieldErrors>,
}

/// An error ready to be rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub fields: Option<FieldErrors>,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into(), fields: None }
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "E_NOT_FOUND", "not found")
    }

    #[must_use]
    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "E_FORBIDDEN", "you do not have permission to do that")
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "E_UNAUTHORIZED", "please log in to access this page")
    }

    #[must_use]
    pub fn already_authenticated() -> Self {
        Self::new(StatusCode::CONFLICT, "E_ALREADY_AUTHENTICATED", "already logged in")
    }

    #[must_use]
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "E_INTERNAL", "something went wrong")
    }

    #[must_use]
    pub fn validation(fields: FieldErrors) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            code: "E_VALIDATION",
            message: "invalid form data".to_owned(),
            fields: Some(fields),
        }
    }

    /// Log a backend failure and collapse it into an opaque 500.
    pub fn from_database(err: &sqlx::Error) -> Self {
        tracing::error!(error = %err, "database error");
        Self::internal()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody { code: self.code, message: &self.message, fields: self.fields.as_ref() };
        (self.status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::from_database(&err)
    }
}

// =============================================================================
// SERVICE ERROR MAPPING
// =============================================================================

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Invalid(fields) => Self::validation(fields),
            AccountError::InvalidCredentials => {
                Self::new(StatusCode::UNAUTHORIZED, "E_INVALID_CREDENTIALS", MSG_LOGIN_FAILED)
            }
            AccountError::NotFound => Self::not_found(),
            AccountError::Hash(e) => {
                tracing::error!(error = %e, "password hashing failed");
                Self::internal()
            }
            AccountError::Db(e) => Self::from_database(&e),
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::NotFound(_) | QueueError::Page(_) => Self::not_found(),
            QueueError::Forbidden(queue_id) => {
                tracing::warn!(%queue_id, "queue edit by non-author rejected");
                Self::forbidden()
            }
            QueueError::Invalid(fields) => Self::validation(fields),
            QueueError::Database(e) => Self::from_database(&e),
        }
    }
}

impl From<PictureError> for ApiError {
    fn from(err: PictureError) -> Self {
        let mut fields = FieldErrors::new();
        match err {
            PictureError::TooLarge => {
                return Self::new(StatusCode::PAYLOAD_TOO_LARGE, "E_TOO_LARGE", PictureError::TooLarge.to_string());
            }
            PictureError::Io(e) => {
                tracing::error!(error = %e, "profile picture write failed");
                return Self::internal();
            }
            PictureError::Empty => fields.add("picture", "This field is required."),
            PictureError::UnsupportedFormat => fields.add("picture", MSG_PICTURE_FORMAT),
            PictureError::Decode(e) => fields.add("picture", format!("Could not read image: {e}")),
        }
        Self::validation(fields)
    }
}

impl From<RateLimitError> for ApiError {
    fn from(err: RateLimitError) -> Self {
        tracing::warn!(error = %err, "rate limit exceeded");
        Self::new(StatusCode::TOO_MANY_REQUESTS, "E_RATE_LIMITED", err.to_string())
    }
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        tracing::error!(error = %err, "mail delivery failed");
        Self::new(StatusCode::BAD_GATEWAY, "E_MAIL", "could not send email, please try again later")
    }
}

impl From<ResetError> for ApiError {
    fn from(err: ResetError) -> Self {
        match err {
            ResetError::Invalid(fields) => Self::validation(fields),
            ResetError::InvalidToken => {
                Self::new(StatusCode::BAD_REQUEST, "E_INVALID_TOKEN", reset::MSG_INVALID_TOKEN)
            }
            ResetError::Account(e) => e.into(),
            ResetError::Mail(e) => e.into(),
            ResetError::Database(e) => Self::from_database(&e),
        }
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
