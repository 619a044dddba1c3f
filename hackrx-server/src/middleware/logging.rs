//! Middleware for logging requests/responses.

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;

/// How a finished request gets logged.
pub trait LogFn {
    /// Log one request/response pair.
    fn log(method: &str, path: &str, status: u16, latency_ms: u128, request_id: Option<&str>);
}

/// Logs every request at `info`, failures at `warn`.
#[derive(Clone, Copy, Debug)]
pub struct Logger;

impl LogFn for Logger {
    fn log(method: &str, path: &str, status: u16, latency_ms: u128, request_id: Option<&str>) {
        if status >= 500 {
            tracing::warn!(
                subject = "response",
                category = "http.response",
                method,
                path,
                status,
                latency_ms,
                request_id,
                "Request failed"
            );
        } else {
            tracing::info!(
                subject = "response",
                category = "http.response",
                method,
                path,
                status,
                latency_ms,
                request_id,
                "Request finished"
            );
        }
    }
}

/// Logs at `debug` only, for noisy routes such as the healthcheck.
#[derive(Clone, Copy, Debug)]
pub struct DebugOnlyLogger;

impl LogFn for DebugOnlyLogger {
    fn log(method: &str, path: &str, status: u16, latency_ms: u128, request_id: Option<&str>) {
        tracing::debug!(
            subject = "response",
            category = "http.response",
            method,
            path,
            status,
            latency_ms,
            request_id,
            "Request finished"
        );
    }
}

/// Middleware function for logging the method, path, status and latency
/// of each request.
pub async fn log_request_response<L: LogFn>(
    req: Request<Body>,
    next: Next<Body>,
) -> impl IntoResponse {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = if let Some(matched_path) = req.extensions().get::<MatchedPath>() {
        matched_path.as_str().to_string()
    } else {
        req.uri().path().to_string()
    };
    let request_id = req
        .headers()
        .get("request_id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let response: Response = next.run(req).await;

    L::log(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_millis(),
        request_id.as_deref(),
    );

    response
}
