//! Auth routes: registration, login/logout, password reset.

use axum::extract::{FromRef, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::error::ApiError;
use crate::services::account::{self, PasswordForm, RegistrationForm, User};
use crate::services::reset::{self, ResetError, ResetRequestForm};
use crate::services::session::{self, SessionUser};
use crate::state::AppState;

pub(crate) const COOKIE_NAME: &str = "session_token";

pub const MSG_RESET_SENT: &str = "An email has been sent with instructions to reset your password.";
pub const MSG_PASSWORD_UPDATED: &str = "Your password has been updated! You are now able to log in";

// =============================================================================
// AUTH EXTRACTORS
// =============================================================================

fn cookie_token(parts: &axum::http::request::Parts) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    jar.get(COOKIE_NAME)
        .map(Cookie::value)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
}

/// Authenticated user extracted from the session cookie.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: SessionUser,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = cookie_token(parts).ok_or_else(ApiError::unauthorized)?;

        let app_state = AppState::from_ref(state);
        let user = session::validate_session(&app_state.pool, &token)
            .await?
            .ok_or_else(ApiError::unauthorized)?;

        Ok(Self { user })
    }
}

/// Signed-in user if the request carries a valid session, otherwise `None`.
/// Requests without a cookie never touch the database.
pub struct MaybeUser(pub Option<SessionUser>);

impl<S> axum::extract::FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = cookie_token(parts) else {
            return Ok(Self(None));
        };
        let app_state = AppState::from_ref(state);
        Ok(Self(session::validate_session(&app_state.pool, &token).await?))
    }
}

impl MaybeUser {
    /// Reject with 409 when someone is already signed in.
    fn ensure_anonymous(&self) -> Result<(), ApiError> {
        match &self.0 {
            Some(_) => Err(ApiError::already_authenticated()),
            None => Ok(()),
        }
    }
}

// =============================================================================
// COOKIES
// =============================================================================

/// Session cookie. `remember` makes it persistent, otherwise it dies with the browser.
pub(crate) fn session_cookie(token: String, remember: bool, secure: bool) -> Cookie<'static> {
    let builder = Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure);
    if remember {
        builder.max_age(session::REMEMBER_TTL).build()
    } else {
        builder.build()
    }
}

pub(crate) fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::ZERO)
        .build()
}

/// Accept `next` only when it is a path on this site, otherwise `/`.
#[must_use]
pub fn sanitize_next(next: Option<&str>) -> String {
    match next.map(str::trim) {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => path.to_owned(),
        _ => "/".to_owned(),
    }
}

fn limiter_key(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /api/auth/register`: create an account.
pub async fn register(
    State(state): State<AppState>,
    current: MaybeUser,
    Json(form): Json<RegistrationForm>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    current.ensure_anonymous()?;
    let user = account::register(&state.pool, &form, state.config.bcrypt_cost).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    next: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: User,
    pub redirect: String,
}

/// `POST /api/auth/login?next=`: check credentials, set cookie.
pub async fn login(
    State(state): State<AppState>,
    current: MaybeUser,
    jar: CookieJar,
    Query(query): Query<LoginQuery>,
    Json(form): Json<LoginForm>,
) -> Result<Response, ApiError> {
    current.ensure_anonymous()?;
    let key = limiter_key(&form.email);
    state.login_limiter.check_and_record(&key)?;

    let user = match account::authenticate(&state.pool, &form.email, &form.password).await {
        Ok(user) => user,
        Err(e) => {
            tracing::info!(email = %key, "login rejected");
            return Err(e.into());
        }
    };
    state.login_limiter.reset_key(&key);

    let token = session::create_session(&state.pool, user.id, session::session_ttl(form.remember)).await?;
    tracing::info!(user_id = %user.id, remember = form.remember, "user logged in");

    let jar = jar.add(session_cookie(token, form.remember, state.config.cookie_secure));
    let body = LoginResponse { user, redirect: sanitize_next(query.next.as_deref()) };
    Ok((jar, Json(body)).into_response())
}

/// `GET /api/auth/me`: return current user.
pub async fn me(auth: AuthUser) -> Json<SessionUser> {
    Json(auth.user)
}

/// `POST /api/auth/logout`: delete session if any, clear cookie.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    if let Some(token) = jar.get(COOKIE_NAME).map(Cookie::value).filter(|t| !t.is_empty()) {
        if let Err(e) = session::delete_session(&state.pool, token).await {
            tracing::warn!(error = %e, "session delete failed during logout");
        }
    }

    let jar = jar.add(clear_session_cookie(state.config.cookie_secure));
    (jar, StatusCode::NO_CONTENT)
}

/// `POST /api/auth/reset-password`: mail a reset link.
pub async fn reset_request(
    State(state): State<AppState>,
    current: MaybeUser,
    Json(form): Json<ResetRequestForm>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    current.ensure_anonymous()?;
    reset::validate_request(&form).map_err(ApiError::validation)?;
    state.reset_limiter.check_and_record(&limiter_key(&form.email))?;

    reset::request_reset(&state.pool, state.mailer.as_ref(), &state.config.public_base_url, &form).await?;
    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "message": MSG_RESET_SENT }))))
}

/// `GET /api/auth/reset-password/{token}`: is the link still usable?
pub async fn reset_check(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    reset::peek_reset_token(&state.pool, &token)
        .await?
        .ok_or(ResetError::InvalidToken)?;
    Ok(Json(serde_json::json!({ "valid": true })))
}

/// `POST /api/auth/reset-password/{token}`: set a new password.
pub async fn reset_complete(
    State(state): State<AppState>,
    current: MaybeUser,
    Path(token): Path<String>,
    Json(form): Json<PasswordForm>,
) -> Result<Json<serde_json::Value>, ApiError> {
    current.ensure_anonymous()?;
    reset::complete_reset(&state.pool, &token, &form, state.config.bcrypt_cost).await?;
    Ok(Json(serde_json::json!({ "message": MSG_PASSWORD_UPDATED })))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
