use super::*;

use clap::CommandFactory;

#[test]
fn cli_definition_is_valid() {
    Cli::command().debug_assert();
}

#[test]
fn parses_queue_update_with_partial_fields() {
    let id = Uuid::nil();
    let cli = Cli::try_parse_from(["healthqueue-cli", "queue", "update", &id.to_string(), "--title", "Ann"]).unwrap();
    match cli.command {
        Command::Queue(QueueCommand { command: QueueSubcommand::Update { queue_id, title, content } }) => {
            assert_eq!(queue_id, id);
            assert_eq!(title.as_deref(), Some("Ann"));
            assert!(content.is_none());
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn api_url_joins_segments_under_base() {
    let url = api_url("http://localhost:3000/", &["api", "home"]).unwrap();
    assert_eq!(url.as_str(), "http://localhost:3000/api/home");
    let url = api_url("http://localhost:3000", &["healthz"]).unwrap();
    assert_eq!(url.as_str(), "http://localhost:3000/healthz");
}

#[test]
fn api_url_keeps_base_path_prefix() {
    let url = api_url("https://clinic.example.org/queue/", &["api", "auth", "me"]).unwrap();
    assert_eq!(url.as_str(), "https://clinic.example.org/queue/api/auth/me");
}

#[test]
fn api_url_escapes_reserved_characters_in_segments() {
    let url = api_url("http://localhost:3000", &["api", "users", "dr/who?x#y", "queues"]).unwrap();
    assert_eq!(url.as_str(), "http://localhost:3000/api/users/dr%2Fwho%3Fx%23y/queues");
}

#[test]
fn api_url_rejects_bad_base() {
    assert!(matches!(api_url("not a url", &["api"]), Err(CliError::BaseUrl { .. })));
    assert!(matches!(api_url("mailto:nurse@clinic.org", &["api"]), Err(CliError::BaseUrl { .. })));
}

#[test]
fn page_query_only_when_page_given() {
    assert!(page_query(None).is_empty());
    assert_eq!(page_query(Some(3)), vec![("page", "3".to_owned())]);
}

#[test]
fn prepared_request_encodes_query_values() {
    let client = reqwest::Client::new();
    let url = api_url("http://localhost:3000", &["api", "auth", "login"]).unwrap();
    let query = [("next", "/a?b=c&d".to_owned())];
    let request = prepare_request(&client, reqwest::Method::POST, url, &query, None).build().unwrap();
    assert_eq!(request.url().path(), "/api/auth/login");
    assert_eq!(request.url().query(), Some("next=%2Fa%3Fb%3Dc%26d"));
}

#[test]
fn prepared_request_without_query_has_none() {
    let client = reqwest::Client::new();
    let url = api_url("http://localhost:3000", &["api", "home"]).unwrap();
    let request = prepare_request(&client, reqwest::Method::GET, url, &[], None).build().unwrap();
    assert_eq!(request.url().query(), None);
}

#[test]
fn session_token_extracted_from_set_cookie() {
    let mut headers = HeaderMap::new();
    headers.append(SET_COOKIE, HeaderValue::from_static("other=1; Path=/"));
    headers.append(SET_COOKIE, HeaderValue::from_static("session_token=abc123; HttpOnly; SameSite=Lax; Path=/"));
    assert_eq!(session_token_from_headers(&headers).as_deref(), Some("abc123"));
}

#[test]
fn cleared_cookie_is_not_a_token() {
    let mut headers = HeaderMap::new();
    headers.append(SET_COOKIE, HeaderValue::from_static("session_token=; Max-Age=0; Path=/"));
    assert_eq!(session_token_from_headers(&headers), None);
}

#[test]
fn error_message_prefers_envelope() {
    let body = serde_json::json!({ "code": "E_FORBIDDEN", "message": "you do not have permission to do that" });
    assert_eq!(error_message(&body), "you do not have permission to do that");

    let body = serde_json::json!({
        "code": "E_VALIDATION",
        "message": "invalid form data",
        "fields": { "title": ["This field is required."] },
    });
    let message = error_message(&body);
    assert!(message.starts_with("invalid form data"));
    assert!(message.contains("This field is required."));

    assert_eq!(error_message(&Value::Null), "null");
}

#[test]
fn queue_update_fills_missing_fields_from_current() {
    let current = serde_json::json!({ "title": "Ann", "content": "X-ray" });
    let body = merge_queue_update(&current, None, Some("MRI".into())).unwrap();
    assert_eq!(body, serde_json::json!({ "title": "Ann", "content": "MRI" }));
}

#[test]
fn queue_update_requires_a_change() {
    let current = serde_json::json!({ "title": "Ann", "content": "X-ray" });
    assert!(matches!(merge_queue_update(&current, None, None), Err(CliError::EmptyUpdate)));
}
