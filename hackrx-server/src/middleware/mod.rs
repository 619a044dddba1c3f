//! Additional [axum::middleware] and outbound client middleware.

pub mod client;
pub mod logging;
pub mod metrics;
pub mod request_ulid;
pub mod runtime;
