//! OpenAPI doc generation.

use crate::{
    error::AppError,
    extract::bearer_addon::BearerAddon,
    routes::{health, ping, run},
};
use hackrx_core::common::{RunRequest, RunResponse};
use utoipa::OpenApi;

/// API documentation generator.
#[derive(OpenApi)]
#[openapi(
    paths(health::healthcheck, ping::get, run::run),
    components(schemas(AppError, RunRequest, RunResponse, health::HealthcheckResponse)),
    modifiers(&BearerAddon),
)]

/// Tied to OpenAPI documentation.
#[derive(Debug)]
pub struct ApiDoc;
