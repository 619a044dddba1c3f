//! hackrx-worker: answers questions requested over the event channel

use anyhow::Result;
use clap::Parser;
use hackrx_server::{
    middleware::client,
    pipeline::{generator::ConfiguredGenerator, Pipeline},
    settings::Settings,
    setups::prod::RedisEventPublisher,
    shutdown::{cancel_on_stdin_close, capture_sigterm},
    store::DocumentStore,
    tracer::setup_tracing,
    worker::Worker,
};
use std::{io, path::PathBuf, process::exit};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "hackrx-worker")]
#[command(about = "Answer questions requested over the hackrx event channel")]
struct Args {
    /// Path to a settings.toml. Defaults to the bundled config/settings.toml
    #[arg(long)]
    config_path: Option<PathBuf>,
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

    let settings = Settings::load(args.config_path)?;

    info!(
        subject = "worker_settings",
        category = "init",
        "starting with settings: {:?}",
        settings,
    );

    let cancellation_token = CancellationToken::new();

    if args.close_on_stdin_close {
        cancel_on_stdin_close(cancellation_token.clone())?;
    }

    tokio::spawn({
        let cancellation_token = cancellation_token.clone();
        async move {
            capture_sigterm().await;

            cancellation_token.cancel();
            println!("\nCtrl+C received, shutting down. Press Ctrl+C again to force shutdown.");

            capture_sigterm().await;

            exit(130)
        }
    });

    if !settings.events.is_enabled {
        tracing::warn!("Events are disabled, the worker idles until shut down");
        cancellation_token.cancelled().await;
        return Ok(());
    }

    let client = client::build(&settings.http_client)?;
    let worker = Worker::new(
        DocumentStore::new(settings.relative_downloads_dir(), client.clone()),
        Pipeline::new(
            &settings.pipeline,
            ConfiguredGenerator::from_settings(&settings.generator, client),
        ),
        RedisEventPublisher::connect(&settings.events).await?,
    );

    let redis = redis::Client::open(settings.events.redis_url.as_str())?;
    worker
        .run(&redis, &settings.events.channel, cancellation_token)
        .await
}
