use clap::{Args, Parser, Subcommand};
use reqwest::Url;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue, SET_COOKIE};
use serde_json::{Map, Value};
use uuid::Uuid;

const COOKIE_NAME: &str = "session_token";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing session token; pass --session-token or set HEALTHQUEUE_SESSION_TOKEN")]
    MissingSessionToken,
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid base url {url}: {reason}")]
    BaseUrl { url: String, reason: String },
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("server returned HTTP {status}: {message}")]
    ServerError { status: u16, message: String },
    #[error("login response did not set a session cookie")]
    MissingCookie,
    #[error("nothing to update; pass --title and/or --content")]
    EmptyUpdate,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "healthqueue-cli", about = "Health Queue JSON API client")]
struct Cli {
    #[arg(long, env = "HEALTHQUEUE_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[arg(long, env = "HEALTHQUEUE_SESSION_TOKEN")]
    session_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone)]
struct CliContext {
    base_url: String,
    session_token: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check `/healthz`.
    Ping,
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "HEALTHQUEUE_PASSWORD")]
        password: String,
    },
    /// Log in and print the session token to export.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "HEALTHQUEUE_PASSWORD")]
        password: String,
        #[arg(long, default_value_t = false)]
        remember: bool,
        #[arg(long)]
        next: Option<String>,
    },
    Logout,
    Me,
    /// Page through every queued patient.
    Home {
        #[arg(long)]
        page: Option<i64>,
    },
    UserQueues {
        username: String,
        #[arg(long)]
        page: Option<i64>,
    },
    Queue(QueueCommand),
    ResetRequest {
        #[arg(long)]
        email: String,
    },
    ResetPassword {
        token: String,
        #[arg(long, env = "HEALTHQUEUE_PASSWORD")]
        password: String,
    },
}

#[derive(Args, Debug)]
struct QueueCommand {
    #[command(subcommand)]
    command: QueueSubcommand,
}

#[derive(Subcommand, Debug)]
enum QueueSubcommand {
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
    },
    Show {
        queue_id: Uuid,
    },
    Update {
        queue_id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
    },
    Delete {
        queue_id: Uuid,
    },
}

/// Whether a request needs the session cookie or sends it only when one is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    Required,
    IfPresent,
}

struct ApiResponse {
    headers: HeaderMap,
    body: Value,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let ctx = CliContext { base_url: cli.base_url, session_token: cli.session_token };

    match cli.command {
        Command::Ping => run_ping(&ctx).await,
        Command::Register { username, email, password } => {
            let body = serde_json::json!({
                "username": username,
                "email": email,
                "password": password,
                "confirm_password": password,
            });
            let url = api_url(&ctx.base_url, &["api", "auth", "register"])?;
            print_response(&ctx, reqwest::Method::POST, url, &[], Some(body), Auth::IfPresent).await
        }
        Command::Login { email, password, remember, next } => run_login(&ctx, email, password, remember, next).await,
        Command::Logout => {
            let url = api_url(&ctx.base_url, &["api", "auth", "logout"])?;
            api_request(&ctx, reqwest::Method::POST, url, &[], None, Auth::IfPresent).await?;
            println!("logged out");
            Ok(())
        }
        Command::Me => {
            let url = api_url(&ctx.base_url, &["api", "auth", "me"])?;
            print_response(&ctx, reqwest::Method::GET, url, &[], None, Auth::Required).await
        }
        Command::Home { page } => {
            let url = api_url(&ctx.base_url, &["api", "home"])?;
            print_response(&ctx, reqwest::Method::GET, url, &page_query(page), None, Auth::IfPresent).await
        }
        Command::UserQueues { username, page } => {
            let url = api_url(&ctx.base_url, &["api", "users", username.as_str(), "queues"])?;
            print_response(&ctx, reqwest::Method::GET, url, &page_query(page), None, Auth::IfPresent).await
        }
        Command::Queue(queue) => run_queue(&ctx, queue).await,
        Command::ResetRequest { email } => {
            let body = serde_json::json!({ "email": email });
            let url = api_url(&ctx.base_url, &["api", "auth", "reset-password"])?;
            print_response(&ctx, reqwest::Method::POST, url, &[], Some(body), Auth::IfPresent).await
        }
        Command::ResetPassword { token, password } => {
            let body = serde_json::json!({ "password": password, "confirm_password": password });
            let url = api_url(&ctx.base_url, &["api", "auth", "reset-password", token.as_str()])?;
            print_response(&ctx, reqwest::Method::POST, url, &[], Some(body), Auth::IfPresent).await
        }
    }
}

async fn run_ping(cli: &CliContext) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    let url = api_url(&cli.base_url, &["healthz"])?;
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::ServerError { status: status.as_u16(), message: "health check failed".to_owned() });
    }
    println!("ok");
    Ok(())
}

async fn run_login(
    cli: &CliContext,
    email: String,
    password: String,
    remember: bool,
    next: Option<String>,
) -> Result<(), CliError> {
    let url = api_url(&cli.base_url, &["api", "auth", "login"])?;
    let query: Vec<(&str, String)> = next.into_iter().map(|next| ("next", next)).collect();
    let body = serde_json::json!({ "email": email, "password": password, "remember": remember });
    let response = api_request(cli, reqwest::Method::POST, url, &query, Some(body), Auth::IfPresent).await?;

    let token = session_token_from_headers(&response.headers).ok_or(CliError::MissingCookie)?;
    print_json(&response.body)?;
    eprintln!("export HEALTHQUEUE_SESSION_TOKEN={token}");
    Ok(())
}

async fn run_queue(cli: &CliContext, queue: QueueCommand) -> Result<(), CliError> {
    match queue.command {
        QueueSubcommand::Create { title, content } => {
            let body = serde_json::json!({ "title": title, "content": content });
            let url = api_url(&cli.base_url, &["api", "queues"])?;
            print_response(cli, reqwest::Method::POST, url, &[], Some(body), Auth::Required).await
        }
        QueueSubcommand::Show { queue_id } => {
            let url = queue_url(&cli.base_url, queue_id)?;
            print_response(cli, reqwest::Method::GET, url, &[], None, Auth::IfPresent).await
        }
        QueueSubcommand::Update { queue_id, title, content } => {
            let url = queue_url(&cli.base_url, queue_id)?;
            // The server validates a full form, so fill omitted fields from the current entry.
            let current = api_request(cli, reqwest::Method::GET, url.clone(), &[], None, Auth::IfPresent).await?;
            let body = merge_queue_update(&current.body, title, content)?;
            print_response(cli, reqwest::Method::PATCH, url, &[], Some(body), Auth::Required).await
        }
        QueueSubcommand::Delete { queue_id } => {
            let url = queue_url(&cli.base_url, queue_id)?;
            api_request(cli, reqwest::Method::DELETE, url, &[], None, Auth::Required).await?;
            println!("deleted {queue_id}");
            Ok(())
        }
    }
}

async fn print_response(
    cli: &CliContext,
    method: reqwest::Method,
    url: Url,
    query: &[(&str, String)],
    body: Option<Value>,
    auth: Auth,
) -> Result<(), CliError> {
    let response = api_request(cli, method, url, query, body, auth).await?;
    print_json(&response.body)
}

async fn api_request(
    cli: &CliContext,
    method: reqwest::Method,
    url: Url,
    query: &[(&str, String)],
    body: Option<Value>,
    auth: Auth,
) -> Result<ApiResponse, CliError> {
    let mut headers = HeaderMap::new();
    match (auth, cli.session_token.as_deref()) {
        (_, Some(token)) => {
            headers.insert(COOKIE, HeaderValue::from_str(&format!("{COOKIE_NAME}={token}"))?);
        }
        (Auth::Required, None) => return Err(CliError::MissingSessionToken),
        (Auth::IfPresent, None) => {}
    }

    let client = reqwest::Client::builder().default_headers(headers).build()?;
    let response = prepare_request(&client, method, url, query, body).send().await?;
    let status = response.status();
    let headers = response.headers().clone();
    let value = response.json::<Value>().await.unwrap_or_else(|_| Value::Null);

    if !status.is_success() {
        return Err(CliError::ServerError { status: status.as_u16(), message: error_message(&value) });
    }

    Ok(ApiResponse { headers, body: value })
}

fn prepare_request(
    client: &reqwest::Client,
    method: reqwest::Method,
    url: Url,
    query: &[(&str, String)],
    body: Option<Value>,
) -> reqwest::RequestBuilder {
    let request = client.request(method, url);
    let request = if query.is_empty() { request } else { request.query(query) };
    if let Some(json) = body { request.json(&json) } else { request }
}

/// Join path segments under the base URL. Each segment is percent-encoded,
/// so a `/` or `?` inside a username stays within its segment.
fn api_url(base_url: &str, segments: &[&str]) -> Result<Url, CliError> {
    let invalid = |reason: String| CliError::BaseUrl { url: base_url.to_owned(), reason };
    let mut url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| invalid("cannot be a base".to_owned()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn queue_url(base_url: &str, queue_id: Uuid) -> Result<Url, CliError> {
    let id = queue_id.to_string();
    api_url(base_url, &["api", "queues", id.as_str()])
}

fn page_query(page: Option<i64>) -> Vec<(&'static str, String)> {
    page.map(|page| ("page", page.to_string())).into_iter().collect()
}

/// Pull the session token out of `Set-Cookie` headers.
fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == COOKIE_NAME && !value.is_empty())
        .map(|(_, value)| value.to_owned())
}

/// Prefer the envelope's message and field errors over raw JSON.
fn error_message(body: &Value) -> String {
    let Some(message) = body.get("message").and_then(Value::as_str) else {
        return body.to_string();
    };
    match body.get("fields").and_then(Value::as_object) {
        Some(fields) if !fields.is_empty() => format!("{message} {}", Value::Object(fields.clone())),
        _ => message.to_owned(),
    }
}

fn merge_queue_update(current: &Value, title: Option<String>, content: Option<String>) -> Result<Value, CliError> {
    if title.is_none() && content.is_none() {
        return Err(CliError::EmptyUpdate);
    }
    let mut body = Map::new();
    for (key, value) in [("title", title), ("content", content)] {
        let value = value
            .or_else(|| current.get(key).and_then(Value::as_str).map(str::to_owned))
            .unwrap_or_default();
        body.insert(key.to_owned(), Value::String(value));
    }
    Ok(Value::Object(body))
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
