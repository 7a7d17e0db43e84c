//! CLI error handling and miette conversion.

use miette::Report;
use thiserror::Error;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid command-line arguments or options
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Server startup or runtime errors
    #[error(transparent)]
    Server(#[from] nova_server::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Convert a CliError into a miette report for terminal display.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::InvalidArgument(msg) => miette::miette!(
            help = "run `nova --help` for the accepted flags and values",
            "Invalid argument: {msg}"
        ),
        CliError::Server(nova_server::Error::InvalidConfig(msg)) => miette::miette!(
            help = "adjust the configuration flags and restart",
            "Configuration error: {msg}"
        ),
        CliError::Server(nova_server::Error::Bind { addr, source }) => miette::miette!(
            help = "is another server already running on that port? Use --port to pick another",
            "Failed to bind {addr}: {source}"
        ),
        CliError::Server(e) => miette::miette!("{e}"),
    }
}
