//! hackrx-supervisor command line entry point
use crate::supervisor::{ProcessSpec, Supervisor};
use clap::Parser;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// The port the default web process binds
pub const WEB_PORT: u16 = 4004;

/// Run the hackrx web server and worker, exiting when either exits
#[derive(Debug, Parser)]
#[command(name = "hackrx-supervisor")]
pub struct Cli {
    #[arg(
        long = "process",
        value_name = "NAME=COMMAND",
        help = "A process to supervise, run through `sh -c`. Repeatable. Defaults to the web server and the worker"
    )]
    processes: Vec<ProcessSpec>,
    #[arg(
        long,
        default_value_t = 5000,
        help = "How long processes get to exit after their stdin closed, before they're killed"
    )]
    grace_ms: u64,
    #[arg(long, help = "Whether to turn off ansi terminal colors")]
    no_colors: bool,
}

impl Cli {
    /// The processes to supervise
    pub fn specs(&self) -> Vec<ProcessSpec> {
        if self.processes.is_empty() {
            default_specs()
        } else {
            self.processes.clone()
        }
    }

    /// Supervise until the first process exits, returning the status to exit with.
    pub async fn run(&self) -> i32 {
        setup_tracing(!self.no_colors);

        let shutdown = CancellationToken::new();
        tokio::spawn(cancel_on_signal(shutdown.clone()));

        let specs = self.specs();
        tracing::info!(processes = ?specs, "Starting processes");

        let result = Supervisor::new(specs)
            .with_grace_period(Duration::from_millis(self.grace_ms))
            .run(shutdown)
            .await;

        match result {
            Ok(exit) => exit.code(),
            Err(err) => {
                tracing::error!(%err, "Supervision failed");
                err.exit_code()
            }
        }
    }
}

/// The web server on [`WEB_PORT`] and the worker
pub fn default_specs() -> Vec<ProcessSpec> {
    vec![
        ProcessSpec::shell(
            "web",
            format!("exec hackrx-server --port {WEB_PORT} --close-on-stdin-close"),
        ),
        ProcessSpec::shell("worker", "exec hackrx-worker --close-on-stdin-close"),
    ]
}

async fn cancel_on_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(err) => {
                tracing::warn!(%err, "Failed to listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
                token.cancel();
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    let _ = tokio::signal::ctrl_c().await;

    tracing::info!("Received shutdown signal");
    token.cancel();
}

fn setup_tracing(ansi: bool) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(ansi)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
