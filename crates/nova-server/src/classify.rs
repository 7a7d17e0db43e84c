//! Request target classification.

use std::path::Path;

/// How the dispatcher treats a resolved file.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ContentKind {
    /// HTML document: rewritten to inject the reload bootstrap.
    Html,
    /// Script entrypoint: compiled on demand through the bundler.
    Script,
    /// Anything else: streamed through unmodified.
    Raw,
}

impl ContentKind {
    /// Classification is purely extension-based; the file need not exist.
    pub fn of(path: &Path) -> Self {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return ContentKind::Raw;
        };
        match ext.to_ascii_lowercase().as_str() {
            "html" | "htm" => ContentKind::Html,
            "js" | "jsx" | "ts" | "tsx" | "mjs" | "cjs" => ContentKind::Script,
            _ => ContentKind::Raw,
        }
    }
}

/// MIME type for raw passthrough responses.
pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs" | "cjs" | "jsx" | "ts" | "tsx") => "text/javascript; charset=utf-8",
        Some("json" | "map") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("txt" | "md") => "text/plain; charset=utf-8",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}
