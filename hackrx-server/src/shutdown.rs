//! Shutdown triggers shared by the server and worker binaries.

use std::{
    io::{self, Read},
    thread,
    time::Duration,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// How long the server keeps draining open connections once shutdown started.
///
/// Stays below the supervisor's default grace period, so a supervised server
/// finishes draining before it would be killed.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(4);

/// Captures and waits for system signals.
pub async fn capture_sigterm() {
    #[cfg(unix)]
    let term = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to listen for SIGTERM")
            .recv()
            .await
    };

    #[cfg(not(unix))]
    let term = std::future::pending::<()>();

    tokio::select! {
        _ = signal::ctrl_c() => {},
        _ = term => {}
    };
}

/// Cancel `token` once stdin reaches EOF.
///
/// Used when running under a supervisor: closing our stdin asks us to
/// shut down gracefully. Stdin is read on its own thread, outside the
/// runtime, so a still-open stdin never keeps the process from exiting.
pub fn cancel_on_stdin_close(token: CancellationToken) -> io::Result<()> {
    thread::Builder::new()
        .name("stdin-watch".to_string())
        .spawn(move || {
            let mut stdin = io::stdin().lock();
            let mut buf = [0u8; 1024];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) => break,
                    Ok(_) => continue,
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }

            tracing::info!(
                subject = "shutdown",
                category = "stdin",
                "stdin closed, shutting down"
            );
            token.cancel();
        })?;

    Ok(())
}
