//! hackrx-server

use anyhow::{anyhow, Result};
use axum::{headers::HeaderName, routing::get, Router};
use axum_server::Handle;
use clap::Parser;
use hackrx_server::{
    app_state::{AppState, AppStateBuilder},
    docs::ApiDoc,
    metrics::prom::setup_metrics_recorder,
    middleware::{self, client, request_ulid::MakeRequestUlid, runtime},
    pipeline::{generator::ConfiguredGenerator, Pipeline},
    router,
    routes::fallback::notfound_404,
    settings::{AppEnvironment, Settings},
    setups::{
        local::{LocalSetup, LogNotifier},
        prod::{DiscordNotifier, ProdSetup, RedisEventPublisher},
        ServerSetup,
    },
    shutdown::{cancel_on_stdin_close, capture_sigterm, DRAIN_TIMEOUT},
    store::DocumentStore,
    tracer::setup_tracing,
};
use http::header;
use metrics_exporter_prometheus::PrometheusHandle;
use reqwest_middleware::ClientBuilder;
use reqwest_retry::RetryTransientMiddleware;
use retry_policies::policies::ExponentialBackoff;
use std::{
    future::{ready, Future},
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    process::exit,
    time::Duration,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer, sensitive_headers::SetSensitiveHeadersLayer,
    timeout::TimeoutLayer, ServiceBuilderExt,
};
use tracing::{error, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Request identifier field.
const REQUEST_ID: &str = "request_id";

#[derive(Debug, Parser)]
#[command(name = "hackrx-server")]
#[command(about = "Answer questions about remote documents over HTTP")]
struct Args {
    /// Path to a settings.toml. Defaults to the bundled config/settings.toml
    #[arg(long)]
    config_path: Option<PathBuf>,
    /// Port to bind the application server to, overriding the settings
    #[arg(long)]
    port: Option<u16>,
    /// Whether to turn off ansi terminal colors
    #[arg(long)]
    no_colors: bool,
    /// Shut down gracefully once stdin is closed
    #[arg(long)]
    close_on_stdin_close: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (stdout_writer, _stdout_guard) = tracing_appender::non_blocking(io::stdout());
    setup_tracing(stdout_writer, args.no_colors)?;

    let mut settings = Settings::load(args.config_path)?;
    if let Some(port) = args.port {
        settings.server.port = port;
    }

    info!(
        subject = "app_settings",
        category = "init",
        "starting with settings: {:?}",
        settings,
    );

    let recorder_handle = setup_metrics_recorder()?;
    let cancellation_token = CancellationToken::new();

    let client = client::build(&settings.http_client)?;
    let store = DocumentStore::new(settings.relative_downloads_dir(), client.clone());
    let pipeline = Pipeline::new(
        &settings.pipeline,
        ConfiguredGenerator::from_settings(&settings.generator, client.clone()),
    );
    let event_publisher = RedisEventPublisher::connect(&settings.events).await?;

    let metrics_server = tokio::spawn(cancel_on_error(
        serve_metrics(
            recorder_handle,
            settings.server.metrics_port,
            cancellation_token.clone(),
        ),
        cancellation_token.clone(),
    ));

    let app_server = match settings.server.environment {
        AppEnvironment::Local => {
            let app_state = AppStateBuilder::<LocalSetup>::default()
                .with_auth(settings.auth.clone())
                .with_store(store)
                .with_pipeline(pipeline)
                .with_notifier(LogNotifier)
                .with_event_publisher(event_publisher)
                .finalize()?;

            tokio::spawn(cancel_on_error(
                serve_app(settings.clone(), app_state, cancellation_token.clone()),
                cancellation_token.clone(),
            ))
        }
        _ => {
            let app_state = AppStateBuilder::<ProdSetup>::default()
                .with_auth(settings.auth.clone())
                .with_store(store)
                .with_pipeline(pipeline)
                .with_notifier(DiscordNotifier::new(&settings.notifier, client))
                .with_event_publisher(event_publisher)
                .finalize()?;

            tokio::spawn(cancel_on_error(
                serve_app(settings.clone(), app_state, cancellation_token.clone()),
                cancellation_token.clone(),
            ))
        }
    };

    if args.close_on_stdin_close {
        cancel_on_stdin_close(cancellation_token.clone())?;
    }

    tokio::spawn(async move {
        capture_sigterm().await;

        cancellation_token.cancel();
        println!("\nCtrl+C received, shutting down. Press Ctrl+C again to force shutdown.");

        capture_sigterm().await;

        exit(130)
    });

    let (metrics, app) = tokio::try_join!(metrics_server, app_server)?;

    if let Err(e) = &metrics {
        error!(%e, "Metrics server crashed");
    }

    if let Err(e) = &app {
        error!(%e, "App server crashed");
    }

    app.and(metrics)
}

/// Run `server`, shutting everything else down if it fails.
async fn cancel_on_error(
    server: impl Future<Output = Result<()>>,
    token: CancellationToken,
) -> Result<()> {
    let result = server.await;
    if result.is_err() {
        token.cancel();
    }
    result
}

async fn serve_metrics(
    recorder_handle: PrometheusHandle,
    port: u16,
    token: CancellationToken,
) -> Result<()> {
    let metrics_router = Router::new()
        .route("/metrics", get(move || ready(recorder_handle.render())))
        .fallback(notfound_404);

    let router = metrics_router.layer(CatchPanicLayer::custom(runtime::catch_panic));

    let server = serve("Metrics", router, port).await?;

    token.cancelled().await;
    server.drain().await
}

async fn serve_app<S: ServerSetup>(
    settings: Settings,
    app_state: AppState<S>,
    token: CancellationToken,
) -> Result<()> {
    let req_id = HeaderName::from_static(REQUEST_ID);

    let router = router::setup_app_router(app_state, &settings.server)
        .route_layer(axum::middleware::from_fn(middleware::metrics::track))
        // Set and propagate "request_id" (as a ulid) per request.
        .layer(
            ServiceBuilder::new()
                .set_request_id(req_id.clone(), MakeRequestUlid)
                .propagate_request_id(req_id),
        )
        // Applies the `tower_http::timeout::Timeout` middleware which
        // applies a timeout to requests.
        .layer(TimeoutLayer::new(Duration::from_millis(
            settings.server.timeout_ms,
        )))
        // Catches runtime panics and converts them into
        // `500 Internal Server` responses.
        .layer(CatchPanicLayer::custom(runtime::catch_panic))
        // Mark headers as sensitive on both requests and responses.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION]))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()));

    let server = serve("Application", router, settings.server.port).await?;
    let addr = server.addr;

    if settings.healthcheck.is_enabled {
        tokio::spawn({
            let cancellation_token = token.clone();
            let settings = settings.healthcheck.clone();

            async move {
                let mut interval =
                    tokio::time::interval(Duration::from_millis(settings.interval_ms));

                let client = ClientBuilder::new(reqwest::Client::new())
                    .with(RetryTransientMiddleware::new_with_policy(
                        ExponentialBackoff::builder().build_with_max_retries(settings.max_retries),
                    ))
                    .build();

                loop {
                    interval.tick().await;

                    if let Ok(response) = client
                        .get(&format!("http://{}/healthcheck", addr))
                        .send()
                        .await
                    {
                        if !response.status().is_success() {
                            break;
                        }
                    } else {
                        break;
                    }
                }

                cancellation_token.cancel();

                error!("Healthcheck failed, shutting down");
            }
        });
    }

    token.cancelled().await;
    server.drain().await
}

/// A bound server, and the task running it.
struct Serving {
    handle: Handle,
    addr: SocketAddr,
    task: JoinHandle<io::Result<()>>,
}

impl Serving {
    /// Stop accepting connections and wait for open ones to finish, for at most [`DRAIN_TIMEOUT`].
    async fn drain(self) -> Result<()> {
        self.handle.graceful_shutdown(Some(DRAIN_TIMEOUT));
        self.task.await??;
        Ok(())
    }
}

async fn serve(name: &str, app: Router, port: u16) -> Result<Serving> {
    let bind_addr: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);

    let handle = Handle::new();

    let task = tokio::spawn({
        let handle = handle.clone();
        async move {
            axum_server::bind(bind_addr)
                .handle(handle)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                .await
        }
    });

    let addr = handle
        .listening()
        .await
        .ok_or_else(|| anyhow!("{name} server failed to bind {bind_addr}"))?;

    info!(
        subject = "app_start",
        category = "init",
        "{} server listening on {}",
        name,
        addr
    );

    Ok(Serving { handle, addr, task })
}
