//! Tracing subscriber setup shared by the server and worker binaries.

use anyhow::Result;
use tracing_appender::non_blocking::NonBlocking;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` isn't set.
pub const DEFAULT_FILTER: &str = "hackrx_server=info,tower_http=info,reqwest_retry=info";

/// Setup [tracing][tracing] layers: formatted logs on `writer`, filtered
/// via `RUST_LOG` (or [`DEFAULT_FILTER`]).
pub fn setup_tracing(writer: NonBlocking, no_colors: bool) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::Registry::default().with(
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(!no_colors)
            .with_filter(filter),
    );

    #[cfg(all(feature = "console", tokio_unstable))]
    #[cfg_attr(docsrs, doc(cfg(feature = "console")))]
    {
        let console_layer = console_subscriber::ConsoleLayer::builder()
            .retention(std::time::Duration::from_secs(60))
            .spawn();

        registry.with(console_layer).try_init()?;
    }

    #[cfg(any(not(feature = "console"), not(tokio_unstable)))]
    {
        registry.try_init()?;
    }

    Ok(())
}
