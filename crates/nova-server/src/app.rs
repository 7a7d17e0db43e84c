//! Request dispatch and server lifecycle.

use axum::body::Body;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{State, WebSocketUpgrade};
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use path_clean::PathClean;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info};

use crate::channel::run_session;
use crate::classify::{content_type, ContentKind};
use crate::config::ServeConfig;
use crate::html::rewrite_document;
use crate::script::compile_script;
use crate::watch::{topic_for, ReloadHub, WatchRegistry};
use crate::{Error, Result};

/// Browser side of the reload protocol, embedded at build time.
const RELOAD_CLIENT: &str = include_str!("../assets/reload-client.js");

/// Response header marking a served-but-failed bundle. The status stays
/// 200 so the reload loop survives a broken build; tooling that cares can
/// check the header.
pub const BUILD_STATUS_HEADER: &str = "x-nova-build";

struct AppState {
    config: ServeConfig,
    hub: Arc<ReloadHub>,
    registry: Arc<WatchRegistry>,
}

/// Build the dispatch router with an externally owned hub and registry.
/// Tests inject their own registry; [`serve`] wires up the real one.
pub fn build_router_with(
    config: ServeConfig,
    hub: Arc<ReloadHub>,
    registry: Arc<WatchRegistry>,
) -> Router {
    let state = Arc::new(AppState {
        config,
        hub,
        registry,
    });
    Router::new()
        .fallback(dispatch)
        // Permissive CORS; this server only ever runs against localhost.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Build the dispatch router with a fresh hub and registry.
pub fn build_router(mut config: ServeConfig) -> Router {
    config.absolutize_root();
    let hub = Arc::new(ReloadHub::new());
    let registry = Arc::new(WatchRegistry::new(Arc::clone(&hub), config.root.clone()));
    build_router_with(config, hub, registry)
}

/// Validate the configuration, bind the listener and serve until shutdown.
pub async fn serve(mut config: ServeConfig) -> Result<()> {
    config.validate()?;
    config.absolutize_root();

    let hub = Arc::new(ReloadHub::new());
    let registry = Arc::new(WatchRegistry::new(Arc::clone(&hub), config.root.clone()));

    if let Some(max_idle) = config.watch_reap {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(max_idle);
            interval.tick().await;
            loop {
                interval.tick().await;
                let evicted = registry.reap(max_idle);
                if evicted > 0 {
                    debug!(evicted, "reaped idle watchers");
                }
            }
        });
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let root = config.root.clone();
    let router = build_router_with(config, hub, registry);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| Error::Bind { addr, source })?;
    info!(addr = %addr, root = %root.display(), "dev server listening");

    axum::serve(listener, router).await?;
    Ok(())
}

/// Resolve a request path against the server root.
///
/// Traversal that escapes the root resolves to nothing; directories
/// resolve to their `index.html`.
fn resolve_path(root: &Path, uri_path: &str) -> Option<PathBuf> {
    let cleaned = Path::new(uri_path.trim_start_matches('/')).to_path_buf().clean();
    if cleaned
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir))
    {
        return None;
    }
    let mut full = root.join(cleaned);
    if full.is_dir() {
        full = full.join("index.html");
    }
    Some(full)
}

async fn dispatch(
    State(state): State<Arc<AppState>>,
    // axum 0.8 has no `Option<WebSocketUpgrade>` extractor; `Err` means the
    // request is not a websocket upgrade and falls through to file serving.
    ws: std::result::Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    uri: Uri,
) -> Response {
    let Some(path) = resolve_path(&state.config.root, uri.path()) else {
        return not_found();
    };
    if !path.is_file() {
        return not_found();
    }

    // The upgrade carries the resolved path as the session's primary topic.
    if let Ok(ws) = ws {
        let hub = Arc::clone(&state.hub);
        let topic = topic_for(&state.config.root, &path);
        return ws.on_upgrade(move |socket| run_session(socket, hub, topic));
    }

    match ContentKind::of(&path) {
        ContentKind::Html => serve_html(&state, &path).await,
        ContentKind::Script => serve_script(&state, &path).await,
        ContentKind::Raw => serve_raw(&state, &path).await,
    }
}

async fn serve_html(state: &AppState, path: &Path) -> Response {
    let input = match tokio::fs::read_to_string(path).await {
        Ok(input) => input,
        Err(e) => return internal_error(path, &e),
    };

    let transform = rewrite_document(&input, RELOAD_CLIENT);

    state.registry.ensure(path);
    for dep in &transform.dependencies {
        state.registry.ensure(&state.config.root.join(dep));
    }

    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        transform.body,
    )
        .into_response()
}

async fn serve_script(state: &AppState, path: &Path) -> Response {
    let result = compile_script(&state.config.compile, path, &state.config.root).await;
    let script = match result {
        Ok(script) => script,
        Err(e) => return internal_error(path, &e),
    };

    for dep in &script.dependencies {
        state.registry.ensure(dep);
    }

    let mut response = (
        [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
        script.body,
    )
        .into_response();
    if script.failed {
        response
            .headers_mut()
            .insert(BUILD_STATUS_HEADER, header::HeaderValue::from_static("failed"));
    }
    response
}

async fn serve_raw(state: &AppState, path: &Path) -> Response {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => return internal_error(path, &e),
    };

    state.registry.ensure(path);

    (
        [(header::CONTENT_TYPE, content_type(path))],
        Body::from(bytes),
    )
        .into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404 Not Found").into_response()
}

fn internal_error(path: &Path, e: &dyn std::fmt::Display) -> Response {
    error!(path = %path.display(), error = %e, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error").into_response()
}
