use super::*;

// =============================================================================
// sanitize_next
// =============================================================================

#[test]
fn next_defaults_to_root() {
    assert_eq!(sanitize_next(None), "/");
    assert_eq!(sanitize_next(Some("")), "/");
}

#[test]
fn next_keeps_local_paths() {
    assert_eq!(sanitize_next(Some("/account")), "/account");
    assert_eq!(sanitize_next(Some("/user/nurse?page=2")), "/user/nurse?page=2");
}

#[test]
fn next_rejects_external_targets() {
    for target in ["https://evil.example", "//evil.example/x", "/\\evil.example", "account", "javascript:alert(1)"] {
        assert_eq!(sanitize_next(Some(target)), "/", "{target}");
    }
}

// =============================================================================
// cookies
// =============================================================================

#[test]
fn remembered_session_cookie_persists() {
    let cookie = session_cookie("abc".into(), true, true);
    assert_eq!(cookie.name(), COOKIE_NAME);
    assert_eq!(cookie.max_age(), Some(session::REMEMBER_TTL));
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.secure(), Some(true));
    assert_eq!(cookie.same_site(), Some(SameSite::Lax));
}

#[test]
fn browser_session_cookie_has_no_max_age() {
    let cookie = session_cookie("abc".into(), false, false);
    assert_eq!(cookie.max_age(), None);
    assert_eq!(cookie.path(), Some("/"));
}

#[test]
fn cleared_cookie_expires_immediately() {
    let cookie = clear_session_cookie(false);
    assert_eq!(cookie.value(), "");
    assert_eq!(cookie.max_age(), Some(Duration::ZERO));
}

#[test]
fn limiter_key_normalizes_case_and_space() {
    assert_eq!(limiter_key("  Nurse@Clinic.ORG "), "nurse@clinic.org");
}

#[test]
fn login_form_defaults_remember_off() {
    let form: LoginForm = serde_json::from_str(r#"{"email":"a@b.co","password":"x"}"#).unwrap();
    assert!(!form.remember);
}
