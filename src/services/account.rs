//! Account service: registration, credential checks, profile updates.
//!
//! DESIGN
//! ======
//! Form validation runs first and reports every field problem at once.
//! Uniqueness is checked up front for friendly messages and enforced again
//! by the `users` unique constraints, which are mapped back onto the same
//! field errors if a concurrent insert wins the race.

use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::FieldErrors;

pub const USERNAME_MIN_LEN: usize = 2;
pub const USERNAME_MAX_LEN: usize = 20;
pub const EMAIL_MAX_LEN: usize = 120;
pub const DEFAULT_IMAGE_FILE: &str = "default.jpg";

pub const MSG_REQUIRED: &str = "This field is required.";
pub const MSG_INVALID_EMAIL: &str = "Invalid email address.";
pub const MSG_PASSWORD_MISMATCH: &str = "Field must be equal to password.";
pub const MSG_USERNAME_TAKEN: &str = "That username is taken. Please choose a different one.";
pub const MSG_EMAIL_TAKEN: &str = "That email is taken. Please choose a different one.";

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("invalid account form")]
    Invalid(FieldErrors),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("user not found")]
    NotFound,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

// =============================================================================
// TYPES
// =============================================================================

/// A registered user as exposed over the API. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub image_file: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordForm {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// Validated and normalized identity fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub email: String,
}

// =============================================================================
// VALIDATION
// =============================================================================

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    if normalized.is_empty() || normalized.len() > EMAIL_MAX_LEN || normalized.contains(char::is_whitespace) {
        return None;
    }
    let parts = normalized.split('@').collect::<Vec<_>>();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return None;
    }
    let domain = parts[1];
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return None;
    }
    Some(normalized)
}

fn check_username(username: &str, errors: &mut FieldErrors) -> String {
    let username = username.trim();
    let len = username.chars().count();
    if len == 0 {
        errors.add("username", MSG_REQUIRED);
    } else if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        errors.add(
            "username",
            format!("Field must be between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN} characters long."),
        );
    }
    username.to_owned()
}

fn check_email(email: &str, errors: &mut FieldErrors) -> String {
    if email.trim().is_empty() {
        errors.add("email", MSG_REQUIRED);
        return String::new();
    }
    normalize_email(email).unwrap_or_else(|| {
        errors.add("email", MSG_INVALID_EMAIL);
        String::new()
    })
}

fn check_password_pair(password: &str, confirm: &str, errors: &mut FieldErrors) {
    if password.is_empty() {
        errors.add("password", MSG_REQUIRED);
    }
    if confirm.is_empty() {
        errors.add("confirm_password", MSG_REQUIRED);
    } else if confirm != password {
        errors.add("confirm_password", MSG_PASSWORD_MISMATCH);
    }
}

/// Validate a sign-up form without touching the database.
///
/// # Errors
///
/// Returns every field that failed validation.
pub fn validate_registration(form: &RegistrationForm) -> Result<Identity, FieldErrors> {
    let mut errors = FieldErrors::new();
    let username = check_username(&form.username, &mut errors);
    let email = check_email(&form.email, &mut errors);
    check_password_pair(&form.password, &form.confirm_password, &mut errors);
    errors.into_result()?;
    Ok(Identity { username, email })
}

/// Validate an account update form without touching the database.
///
/// # Errors
///
/// Returns every field that failed validation.
pub fn validate_account(form: &AccountForm) -> Result<Identity, FieldErrors> {
    let mut errors = FieldErrors::new();
    let username = check_username(&form.username, &mut errors);
    let email = check_email(&form.email, &mut errors);
    errors.into_result()?;
    Ok(Identity { username, email })
}

/// Validate a new-password form.
///
/// # Errors
///
/// Returns the password fields that failed validation.
pub fn validate_password(form: &PasswordForm) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    check_password_pair(&form.password, &form.confirm_password, &mut errors);
    errors.into_result()
}

// =============================================================================
// PASSWORD HASHING
// =============================================================================

/// Hash a password with bcrypt on the blocking pool.
///
/// # Errors
///
/// Returns `AccountError::Hash` if bcrypt fails or the task is cancelled.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, AccountError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AccountError::Hash(e.to_string()))?
        .map_err(|e| AccountError::Hash(e.to_string()))
}

/// Check a password against a stored bcrypt hash. Malformed hashes never match.
pub async fn verify_password(password: &str, hash: &str) -> bool {
    let password = password.to_owned();
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .unwrap_or(false)
}

// =============================================================================
// QUERIES
// =============================================================================

const USER_COLUMNS: &str = "id, username, email, image_file, created_at";

fn user_from_row(row: &sqlx::postgres::PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        image_file: row.get("image_file"),
        created_at: row.get("created_at"),
    }
}

pub async fn find_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(user_from_row))
}

pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(user_from_row))
}

/// Look up a user by email. The input is normalized first; malformed input yields `None`.
pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    let Some(email) = normalize_email(email) else {
        return Ok(None);
    };
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(user_from_row))
}

/// Record "taken" errors for identity fields already used by another user.
async fn check_identity_available(
    pool: &PgPool,
    identity: &Identity,
    exclude_user: Option<Uuid>,
) -> Result<(), AccountError> {
    let rows = sqlx::query(
        r"SELECT username = $1 AS username_taken, email = $2 AS email_taken
          FROM users
          WHERE (username = $1 OR email = $2) AND ($3::uuid IS NULL OR id <> $3)",
    )
    .bind(&identity.username)
    .bind(&identity.email)
    .bind(exclude_user)
    .fetch_all(pool)
    .await?;

    let mut errors = FieldErrors::new();
    if rows.iter().any(|r| r.get::<bool, _>("username_taken")) {
        errors.add("username", MSG_USERNAME_TAKEN);
    }
    if rows.iter().any(|r| r.get::<bool, _>("email_taken")) {
        errors.add("email", MSG_EMAIL_TAKEN);
    }
    errors.into_result().map_err(AccountError::Invalid)
}

/// Translate a unique-constraint race into the matching field error.
fn map_unique_violation(err: sqlx::Error) -> AccountError {
    let taken = err
        .as_database_error()
        .filter(|db_err| db_err.is_unique_violation())
        .and_then(|db_err| db_err.constraint())
        .and_then(|constraint| {
            if constraint.contains("username") {
                Some(("username", MSG_USERNAME_TAKEN))
            } else if constraint.contains("email") {
                Some(("email", MSG_EMAIL_TAKEN))
            } else {
                None
            }
        });

    let Some((field, message)) = taken else {
        return AccountError::Db(err);
    };
    let mut errors = FieldErrors::new();
    errors.add(field, message);
    AccountError::Invalid(errors)
}

/// Create a new account.
///
/// # Errors
///
/// `Invalid` for bad or already-taken fields, `Hash`/`Db` for backend failures.
pub async fn register(pool: &PgPool, form: &RegistrationForm, bcrypt_cost: u32) -> Result<User, AccountError> {
    let identity = validate_registration(form).map_err(AccountError::Invalid)?;
    check_identity_available(pool, &identity, None).await?;

    let password_hash = hash_password(&form.password, bcrypt_cost).await?;
    let row = sqlx::query(&format!(
        "INSERT INTO users (id, username, email, image_file, password_hash)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&identity.username)
    .bind(&identity.email)
    .bind(DEFAULT_IMAGE_FILE)
    .bind(password_hash)
    .fetch_one(pool)
    .await
    .map_err(map_unique_violation)?;

    let user = user_from_row(&row);
    tracing::info!(user_id = %user.id, username = %user.username, "account registered");
    Ok(user)
}

/// Check an email/password pair.
///
/// Unknown emails and wrong passwords are indistinguishable to the caller.
///
/// # Errors
///
/// `InvalidCredentials` on mismatch, `Db` on query failure.
pub async fn authenticate(pool: &PgPool, email: &str, password: &str) -> Result<User, AccountError> {
    let Some(email) = normalize_email(email) else {
        return Err(AccountError::InvalidCredentials);
    };
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"))
        .bind(&email)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Err(AccountError::InvalidCredentials);
    };
    let hash: String = row.get("password_hash");
    if !verify_password(password, &hash).await {
        return Err(AccountError::InvalidCredentials);
    }
    Ok(user_from_row(&row))
}

/// Update the username and email of an existing account.
///
/// # Errors
///
/// `Invalid` for bad or taken fields, `NotFound` if the user vanished.
pub async fn update_account(pool: &PgPool, user_id: Uuid, form: &AccountForm) -> Result<User, AccountError> {
    let identity = validate_account(form).map_err(AccountError::Invalid)?;
    check_identity_available(pool, &identity, Some(user_id)).await?;

    let row = sqlx::query(&format!(
        "UPDATE users SET username = $2, email = $3 WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(user_id)
    .bind(&identity.username)
    .bind(&identity.email)
    .fetch_optional(pool)
    .await
    .map_err(map_unique_violation)?
    .ok_or(AccountError::NotFound)?;

    Ok(user_from_row(&row))
}

/// Point the account at a freshly saved profile picture.
pub async fn set_image_file(pool: &PgPool, user_id: Uuid, image_file: &str) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(&format!("UPDATE users SET image_file = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"))
        .bind(user_id)
        .bind(image_file)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(user_from_row))
}

/// Store an already hashed password. Takes any executor so a reset can run
/// it inside its transaction.
///
/// # Errors
///
/// `NotFound` if the user does not exist.
pub async fn set_password_hash<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Uuid,
    password_hash: &str,
) -> Result<(), AccountError> {
    let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
        .bind(user_id)
        .bind(password_hash)
        .execute(executor)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AccountError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
#[path = "account_test.rs"]
mod tests;
