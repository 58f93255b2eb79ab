//! Password reset tokens.
//!
//! ARCHITECTURE
//! ============
//! A reset token is 32 random bytes, hex-encoded and mailed to the user.
//! Only its SHA-256 digest is stored. Tokens expire after 30 minutes and
//! are consumed with `DELETE ... RETURNING`, so each one works once.
//! Issuing a new token revokes any older unconsumed ones for that user.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::error::FieldErrors;
use crate::services::account::{self, AccountError, PasswordForm};
use crate::services::mailer::{MailError, Mailer, OutgoingMail};
use crate::services::session::{self, bytes_to_hex, generate_token};

/// Reset token lifetime in seconds.
pub const RESET_TOKEN_TTL_SECS: i32 = 1800;

/// Site path of the reset form. The mailed link is `{RESET_PAGE_PATH}/{token}`.
pub const RESET_PAGE_PATH: &str = "/reset_password";

pub const RESET_SUBJECT: &str = "Password Reset Request";

pub const MSG_NO_ACCOUNT: &str = "There is no account with that email. You must register first.";
pub const MSG_INVALID_TOKEN: &str = "That is an invalid or expired token";

#[derive(Debug, thiserror::Error)]
pub enum ResetError {
    #[error("invalid reset request")]
    Invalid(FieldErrors),
    #[error("invalid or expired reset token")]
    InvalidToken,
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetRequestForm {
    #[serde(default)]
    pub email: String,
}

#[must_use]
pub fn hash_reset_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.trim().as_bytes());
    bytes_to_hex(&hasher.finalize())
}

/// Absolute link to the reset form for a token.
#[must_use]
pub fn reset_url(public_base_url: &str, token: &str) -> String {
    format!("{}{RESET_PAGE_PATH}/{token}", public_base_url.trim_end_matches('/'))
}

/// Plain-text body of the reset mail.
#[must_use]
pub fn render_reset_text(url: &str) -> String {
    format!(
        "To reset your password, visit the following link:\n{url}\n\n\
         If you did not make this request then simply ignore this email and no changes will be made.\n"
    )
}

/// HTML body of the reset mail.
#[must_use]
pub fn render_reset_html(username: &str, url: &str) -> String {
    RESET_TEMPLATE
        .replace("{{USERNAME}}", &escape_html(username))
        .replace("{{URL}}", &escape_html(url))
}

const RESET_TEMPLATE: &str = include_str!("../../templates/password_reset.html");

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Issue a fresh token for `user_id`, revoking older ones. Returns the raw token.
pub async fn issue_reset_token(pool: &PgPool, user_id: Uuid) -> Result<String, sqlx::Error> {
    let token = generate_token();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        "INSERT INTO password_reset_tokens (token_hash, user_id, expires_at)
         VALUES ($1, $2, now() + make_interval(secs => $3))",
    )
    .bind(hash_reset_token(&token))
    .bind(user_id)
    .bind(f64::from(RESET_TOKEN_TTL_SECS))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(token)
}

/// Check whether a token is currently valid without consuming it.
pub async fn peek_reset_token(pool: &PgPool, token: &str) -> Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar("SELECT user_id FROM password_reset_tokens WHERE token_hash = $1 AND expires_at > now()")
        .bind(hash_reset_token(token))
        .fetch_optional(pool)
        .await
}

/// Consume a token atomically, returning the owning user if it was valid.
pub async fn consume_reset_token<'e>(executor: impl PgExecutor<'e>, token: &str) -> Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar(
        "DELETE FROM password_reset_tokens WHERE token_hash = $1 AND expires_at > now() RETURNING user_id",
    )
    .bind(hash_reset_token(token))
    .fetch_optional(executor)
    .await
}

/// Remove expired tokens. Returns the number of rows deleted.
pub async fn purge_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at <= now()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

// =============================================================================
// FLOWS
// =============================================================================

/// Validate the email field of a reset request. Returns the normalized address.
///
/// # Errors
///
/// Field errors keyed by `email` when it is blank or malformed.
pub fn validate_request(form: &ResetRequestForm) -> Result<String, FieldErrors> {
    let mut errors = FieldErrors::new();
    if form.email.trim().is_empty() {
        errors.add("email", account::MSG_REQUIRED);
        return Err(errors);
    }
    match account::normalize_email(&form.email) {
        Some(email) => Ok(email),
        None => {
            errors.add("email", account::MSG_INVALID_EMAIL);
            Err(errors)
        }
    }
}

/// Mail a reset link to the account registered under `form.email`.
///
/// # Errors
///
/// `Invalid` if the address is malformed or unknown, `Mail` if delivery fails.
pub async fn request_reset(
    pool: &PgPool,
    mailer: &dyn Mailer,
    public_base_url: &str,
    form: &ResetRequestForm,
) -> Result<(), ResetError> {
    let email = validate_request(form).map_err(ResetError::Invalid)?;
    let Some(user) = account::find_by_email(pool, &email).await? else {
        let mut errors = FieldErrors::new();
        errors.add("email", MSG_NO_ACCOUNT);
        return Err(ResetError::Invalid(errors));
    };

    let token = issue_reset_token(pool, user.id).await?;
    let url = reset_url(public_base_url, &token);
    mailer
        .send(OutgoingMail {
            to: user.email.clone(),
            subject: RESET_SUBJECT.to_owned(),
            html: render_reset_html(&user.username, &url),
            text: render_reset_text(&url),
        })
        .await?;

    tracing::info!(user_id = %user.id, "password reset mailed");
    Ok(())
}

/// Set a new password using a mailed token, then sign the user out everywhere.
///
/// The token is checked before the form so a stale link is reported as such
/// even when the passwords are also wrong. The password is hashed before the
/// token is spent, and the token, password and sessions change in one
/// transaction, so a failure leaves the link usable.
///
/// # Errors
///
/// `InvalidToken` for unknown, expired or already used tokens and `Invalid`
/// for mismatched passwords.
pub async fn complete_reset(
    pool: &PgPool,
    token: &str,
    form: &PasswordForm,
    bcrypt_cost: u32,
) -> Result<Uuid, ResetError> {
    if peek_reset_token(pool, token).await?.is_none() {
        return Err(ResetError::InvalidToken);
    }
    account::validate_password(form).map_err(ResetError::Invalid)?;

    let password_hash = account::hash_password(&form.password, bcrypt_cost).await?;

    let mut tx = pool.begin().await?;
    let user_id = consume_reset_token(&mut *tx, token).await?.ok_or(ResetError::InvalidToken)?;
    account::set_password_hash(&mut *tx, user_id, &password_hash).await?;
    let revoked = session::delete_user_sessions(&mut *tx, user_id).await?;
    tx.commit().await?;

    tracing::info!(%user_id, revoked_sessions = revoked, "password reset completed");
    Ok(user_id)
}

#[cfg(test)]
#[path = "reset_test.rs"]
mod tests;
