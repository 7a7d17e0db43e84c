//! Logging setup for the nova CLI.
//!
//! Verbosity is flag-driven (`--verbose`, `--quiet`) with `RUST_LOG` as an
//! escape hatch for precise per-crate filtering.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber. Call once, before any logging.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let filter = if verbose {
        EnvFilter::new("nova_cli=debug,nova_server=debug,nova_bundler=debug")
    } else if quiet {
        EnvFilter::new("nova_cli=error,nova_server=error,nova_bundler=error")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("nova_cli=info,nova_server=info,nova_bundler=info"))
    };

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
