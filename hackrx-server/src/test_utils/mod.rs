//! Testing utilities.
pub mod route_builder;
pub mod test_context;

use crate::{middleware::client, settings};
use reqwest_middleware::ClientWithMiddleware;

/// An outbound client that fails fast: no retries, short timeouts.
pub fn test_client() -> ClientWithMiddleware {
    let settings = settings::HttpClient {
        pool_idle_timeout_ms: None,
        retry_options: settings::HttpClientRetryOptions {
            count: 0,
            bounds_low_ms: 1,
            bounds_high_ms: 1,
        },
        timeout_ms: 5_000,
    };

    client::build(&settings).expect("test client should build")
}
