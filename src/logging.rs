//! Log output setup and middleware for logging requests and responses.

use std::{fs::OpenOptions, io, sync::Arc};

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{MatchedPath, Request},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use tracing_subscriber::{EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

/// The file that debug level logs are appended to.
pub const DEBUG_LOG_PATH: &str = "debug.log";

/// Request and response bodies longer than this many characters are cut
/// short in `info` level logs.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// The largest request body, in bytes, that is read into memory.
///
/// Matches the default limit axum applies to its body extractors.
pub const REQUEST_BODY_SIZE_LIMIT: usize = 2 * 1024 * 1024;

/// Send logs to stdout and append them to [DEBUG_LOG_PATH].
///
/// Stdout gets `info` level logs, or `debug` level logs if `debug` is set.
/// The `RUST_LOG` environment variable overrides the stdout level. The log
/// file always gets `debug` level logs.
///
/// # Errors
/// Returns an error if the log file cannot be opened.
pub fn setup_logging(debug: bool) -> Result<(), io::Error> {
    let default_level = if debug { "debug" } else { "info" };
    let stdout_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(stdout_filter);

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(DEBUG_LOG_PATH)?;

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_ansi(false)
        .with_writer(Arc::new(log_file))
        .with_filter(filter::LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(debug_log)
        .init();

    Ok(())
}

/// Wrap each request handled by `router` in a `request` span.
pub fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // Failed requests are logged where the error is mapped to a response.
        .on_failure(());

    router.layer(tracing_layer)
}

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] characters, it is
/// truncated and logged in full at the `debug` level.
///
/// Requests with a body over [REQUEST_BODY_SIZE_LIMIT] bytes are answered with
/// `413 Payload Too Large` without reaching the handler.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let body_bytes = match axum::body::to_bytes(body, REQUEST_BODY_SIZE_LIMIT).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::warn!(
                "Could not read request body for {} {}: {error}",
                parts.method,
                parts.uri
            );
            return ApiError::InvalidBody {
                status: StatusCode::PAYLOAD_TOO_LARGE,
                message: format!(
                    "request body could not be read within the limit of {REQUEST_BODY_SIZE_LIMIT} bytes"
                ),
            }
            .into_response();
        }
    };
    log_body(
        &format!("Received request: {} {}", parts.method, parts.uri),
        &body_bytes,
    );

    let response = next.run(Request::from_parts(parts, body_bytes.into())).await;

    // The handler has already built the whole response in memory.
    let (parts, body) = response.into_parts();
    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("Could not read response body: {error}");
            return ApiError::Internal.into_response();
        }
    };
    log_body(&format!("Sending response: {}", parts.status), &body_bytes);

    Response::from_parts(parts, Body::from(body_bytes))
}

fn log_body(message: &str, body: &Bytes) {
    let body = String::from_utf8_lossy(body);
    let body = body.as_ref();

    match truncate_body(body) {
        Some(truncated) => {
            tracing::info!("{message}\nbody: {truncated}...");
            tracing::debug!("Full body: {body:?}");
        }
        None => tracing::info!("{message}\nbody: {body:?}"),
    }
}

/// The first [LOG_BODY_LENGTH_LIMIT] characters of `body`, or `None` if
/// `body` is short enough to log in full.
fn truncate_body(body: &str) -> Option<&str> {
    body.char_indices()
        .nth(LOG_BODY_LENGTH_LIMIT)
        .map(|(end, _)| &body[..end])
}
