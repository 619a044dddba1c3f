//! Main [axum::Router] interface for webserver.

use crate::{
    app_state::AppState,
    middleware::logging::{log_request_response, DebugOnlyLogger, Logger},
    routes::{fallback::notfound_404, health, ping, run},
    settings,
    setups::ServerSetup,
};
use axum::{
    routing::{get, post},
    Router,
};

/// Setup main router for application.
///
/// The run endpoint is nested under the configured root endpoint,
/// `/ping` and `/healthcheck` always live at the top level.
pub fn setup_app_router<S: ServerSetup>(
    app_state: AppState<S>,
    server: &settings::Server,
) -> Router {
    let api_router = Router::new()
        .route("/hackrx/run", post(run::run::<S>))
        .with_state(app_state.clone());

    let mut router = Router::new().route("/ping", get(ping::get));

    let prefix = server.route_prefix();
    router = if prefix.is_empty() {
        router.merge(api_router)
    } else {
        router.nest(&prefix, api_router)
    };

    router = router.fallback(notfound_404);

    // Logging layer
    router = router.layer(axum::middleware::from_fn(log_request_response::<Logger>));

    // Healthcheck layer
    let mut healthcheck_router = Router::new()
        .route("/healthcheck", get(health::healthcheck::<S>))
        .with_state(app_state);

    healthcheck_router = healthcheck_router.layer(axum::middleware::from_fn(
        log_request_response::<DebugOnlyLogger>,
    ));

    Router::merge(router, healthcheck_router)
}
