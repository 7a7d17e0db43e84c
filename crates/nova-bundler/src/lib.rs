//! # nova-bundler
//!
//! Rolldown integration for the nova development server.
//!
//! Each HTTP request for a script entrypoint triggers one compile through
//! [`compile`]. The compile installs a set of plugins on top of Rolldown:
//!
//! - [`collect::DepCollectPlugin`] observes every local-filesystem module the
//!   bundler loads, so the server knows which files to watch for the page
//!   that requested the bundle.
//! - [`loaders::LoaderPlugin`] applies per-extension loader overrides
//!   (`.svg:file`, `.md:text`, ...).
//! - [`define::DefinePlugin`] substitutes global identifiers with
//!   compile-time values.
//!
//! Compile failures are not errors at this layer: they come back as
//! [`CompileOutcome`] with `code: None` and a list of
//! [`diagnostics::Diagnostic`]s, because the serving layer turns them into a
//! perfectly good HTTP response.

pub mod collect;
pub mod compile;
pub mod define;
pub mod diagnostics;
pub mod loaders;
pub mod options;

pub use compile::{CompileOutcome, compile};
pub use diagnostics::Diagnostic;
pub use options::{CompileOptions, Loader, ModuleFormat, SourceMapMode};

/// Error types for nova-bundler operations.
///
/// Compile diagnostics are deliberately *not* represented here; see
/// [`CompileOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An option the dev server cannot honor was requested.
    #[error("unsupported option: {0}")]
    Unsupported(String),

    /// Invalid configuration provided.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for nova-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;
