use super::*;

use axum::body::Body;
use axum::http::{Request, header};
use axum::response::Response;
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::state::test_helpers::test_app_state;

async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.expect("router should respond")
}

fn get_req(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_req(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// =============================================================================
// PUBLIC ROUTES
// =============================================================================

#[tokio::test]
async fn healthz_is_ok() {
    let (state, _) = test_app_state();
    let response = send(app(state), get_req("/healthz")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn about_describes_app() {
    let (state, _) = test_app_state();
    let response = send(app(state), get_req("/api/about")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["title"], "About");
    assert_eq!(json["name"], pages::APP_NAME);
}

#[tokio::test]
async fn landing_page_served_at_root() {
    let (state, _) = test_app_state();
    let response = send(app(state), get_req("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("<h1"));
}

#[tokio::test]
async fn mailed_reset_link_serves_reset_form() {
    let (state, _) = test_app_state();
    let url = crate::services::reset::reset_url(&state.config.public_base_url, "deadbeef");
    let path = url
        .strip_prefix(state.config.public_base_url.as_str())
        .expect("link should start with the public base url")
        .to_owned();
    assert_eq!(path, "/reset_password/deadbeef");

    let response = send(app(state), get_req(&path)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("id=\"reset-form\""));
    assert!(html.contains("/js/reset.js"));
}

#[tokio::test]
async fn unknown_api_path_is_json_404() {
    let (state, _) = test_app_state();
    let response = send(app(state), get_req("/api/does-not-exist")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "E_NOT_FOUND");
}

#[tokio::test]
async fn page_zero_is_not_found() {
    let (state, _) = test_app_state();
    let response = send(app(state), get_req("/api/home?page=0")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn negative_user_page_is_not_found() {
    let (state, _) = test_app_state();
    let response = send(app(state), get_req("/api/users/nurse/queues?page=-2")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// AUTH REQUIRED
// =============================================================================

#[tokio::test]
async fn protected_routes_require_cookie() {
    let (state, _) = test_app_state();
    let requests = [
        get_req("/api/auth/me"),
        get_req("/api/account"),
        json_req("PATCH", "/api/account", &serde_json::json!({})),
        json_req("POST", "/api/queues", &serde_json::json!({ "title": "Ann", "content": "X-ray" })),
        json_req("PATCH", &format!("/api/queues/{}", uuid::Uuid::nil()), &serde_json::json!({})),
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/queues/{}", uuid::Uuid::nil()))
            .body(Body::empty())
            .unwrap(),
        Request::builder()
            .method("PUT")
            .uri("/api/account/picture")
            .body(Body::from(vec![0_u8; 16]))
            .unwrap(),
    ];
    for request in requests {
        let uri = request.uri().to_string();
        let response = send(app(state.clone()), request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body_json(response).await["code"], "E_UNAUTHORIZED");
    }
}

#[tokio::test]
async fn logout_without_session_clears_cookie() {
    let (state, _) = test_app_state();
    let response = send(app(state), json_req("POST", "/api/auth/logout", &serde_json::json!({}))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(cookie.starts_with("session_token="));
    assert!(cookie.contains("Max-Age=0"));
}

// =============================================================================
// VALIDATION BEFORE PERSISTENCE
// =============================================================================

#[tokio::test]
async fn register_reports_every_bad_field() {
    let (state, _) = test_app_state();
    let body = serde_json::json!({
        "username": "a",
        "email": "not-an-email",
        "password": "secret",
        "confirm_password": "different",
    });
    let response = send(app(state), json_req("POST", "/api/auth/register", &body)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = body_json(response).await;
    assert_eq!(json["code"], "E_VALIDATION");
    for field in ["username", "email", "confirm_password"] {
        assert!(json["fields"][field].is_array(), "missing error for {field}");
    }
}

#[tokio::test]
async fn reset_request_requires_email() {
    let (state, mailer) = test_app_state();
    let response = send(app(state), json_req("POST", "/api/auth/reset-password", &serde_json::json!({}))).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["fields"]["email"][0], "This field is required.");
    assert!(mailer.sent.lock().unwrap().is_empty());
}

// =============================================================================
// RATE LIMITS
// =============================================================================

#[tokio::test]
async fn login_attempts_are_rate_limited_per_email() {
    let (state, _) = test_app_state();
    let body = serde_json::json!({ "email": "Nurse@Clinic.org", "password": "nope" });

    // The test limiter allows two attempts; both reach the unreachable database.
    for _ in 0..2 {
        let response = send(app(state.clone()), json_req("POST", "/api/auth/login", &body)).await;
        assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    let lowercase = serde_json::json!({ "email": "nurse@clinic.org", "password": "nope" });
    let response = send(app(state), json_req("POST", "/api/auth/login", &lowercase)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(response).await["code"], "E_RATE_LIMITED");
}

#[tokio::test]
async fn reset_requests_are_rate_limited() {
    let (state, mailer) = test_app_state();
    let body = serde_json::json!({ "email": "nurse@clinic.org" });

    let first = send(app(state.clone()), json_req("POST", "/api/auth/reset-password", &body)).await;
    assert_ne!(first.status(), StatusCode::TOO_MANY_REQUESTS);

    let second = send(app(state), json_req("POST", "/api/auth/reset-password", &body)).await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(mailer.sent.lock().unwrap().is_empty());
}
