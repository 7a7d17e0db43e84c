//! # nova-server
//!
//! Development HTTP server with on-demand compilation and live reload.
//!
//! Every request flows through a single dispatch path:
//!
//! 1. The URL is resolved against the project root ([`app`]); traversal
//!    outside the root is a 404 and directories resolve to `index.html`.
//! 2. The target file is classified by extension ([`classify`]).
//! 3. HTML documents are rewritten on the fly ([`html`]): the reload
//!    bootstrap is injected and local script/image references are recorded
//!    as dependencies. Scripts are compiled through nova-bundler
//!    ([`script`]). Everything else streams through unmodified.
//! 4. Served dependencies get filesystem watchers ([`watch`]); change
//!    events fan out to browsers over WebSocket ([`channel`]).
//!
//! The browser side lives in `assets/reload-client.js`, embedded into the
//! binary at build time.

pub mod app;
pub mod channel;
pub mod classify;
pub mod config;
pub mod html;
pub mod script;
pub mod watch;

pub use app::{build_router, serve};
pub use config::ServeConfig;
pub use watch::{ReloadHub, ReloadSignal, WatchRegistry};

/// Error types for nova-server operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },

    #[error("filesystem watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Bundler(#[from] nova_bundler::Error),
}

/// Result type alias for nova-server operations.
pub type Result<T> = std::result::Result<T, Error>;
