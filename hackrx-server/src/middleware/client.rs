//! Outbound HTTP client with retries and request logging.

use crate::settings;
use reqwest::{Request, Response};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware, Next};
use reqwest_retry::RetryTransientMiddleware;
use retry_policies::policies::ExponentialBackoff;
use std::time::{Duration, Instant};
use task_local_extensions::Extensions;

/// Logs outgoing requests and their responses.
#[derive(Clone, Copy, Debug)]
pub struct Logger;

#[async_trait::async_trait]
impl Middleware for Logger {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let method = req.method().to_string();
        let url = req.url().clone();
        let start = Instant::now();

        tracing::debug!(%url, %method, "Running request");

        let result = next.run(req, extensions).await;
        let latency_ms = start.elapsed().as_millis();

        match &result {
            Ok(resp) => {
                let status = resp.status();
                if status.is_client_error() || status.is_server_error() {
                    tracing::warn!(%url, %method, %status, latency_ms, "Request failed");
                } else {
                    let content_length = resp.content_length();
                    tracing::debug!(
                        %url,
                        %method,
                        %status,
                        ?content_length,
                        latency_ms,
                        "Got response"
                    );
                }
            }
            Err(err) => tracing::warn!(%url, %method, %err, latency_ms, "Request errored"),
        }

        result
    }
}

/// Build the client used for document downloads, webhooks and chat calls.
pub fn build(settings: &settings::HttpClient) -> reqwest::Result<ClientWithMiddleware> {
    let retry_options = &settings.retry_options;
    let policy = ExponentialBackoff::builder()
        .retry_bounds(
            Duration::from_millis(retry_options.bounds_low_ms),
            Duration::from_millis(retry_options.bounds_high_ms),
        )
        .build_with_max_retries(retry_options.count.into());

    let client = reqwest::Client::builder()
        .pool_idle_timeout(settings.pool_idle_timeout())
        .timeout(settings.timeout())
        .build()?;

    Ok(ClientBuilder::new(client)
        .with(Logger)
        .with(RetryTransientMiddleware::new_with_policy(policy))
        .build())
}
