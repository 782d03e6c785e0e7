use axum::{body::Body, http::Request};
use tracing::{Level, Span};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "todo_app=info,tower_http=info";

pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Root span for one request. `user_id` is filled in by the identity guards,
/// so every event logged while handling the request carries the caller.
pub fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    // path only: headers and bodies can carry credentials
    tracing::span!(
        Level::INFO,
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id,
        user_id = tracing::field::Empty,
    )
}
