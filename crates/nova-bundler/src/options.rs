//! Compile option types shared between the CLI and the server.

use rolldown::{OutputFormat, SourceMapType};
use rolldown_common::ModuleType;
use std::str::FromStr;

use crate::{Error, Result};

/// Module format of the generated bundle.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum ModuleFormat {
    /// ECMAScript modules (import/export syntax).
    #[default]
    Esm,
    /// CommonJS modules (require/module.exports).
    Cjs,
    /// Immediately Invoked Function Expression for plain script tags.
    Iife,
}

impl ModuleFormat {
    pub(crate) fn to_rolldown(self) -> OutputFormat {
        match self {
            ModuleFormat::Esm => OutputFormat::Esm,
            ModuleFormat::Cjs => OutputFormat::Cjs,
            ModuleFormat::Iife => OutputFormat::Iife,
        }
    }
}

impl FromStr for ModuleFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "esm" => Ok(ModuleFormat::Esm),
            "cjs" => Ok(ModuleFormat::Cjs),
            "iife" => Ok(ModuleFormat::Iife),
            other => Err(Error::InvalidConfig(format!(
                "unknown module format '{other}' (expected esm, cjs or iife)"
            ))),
        }
    }
}

/// Source map generation mode.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum SourceMapMode {
    /// No source maps.
    #[default]
    None,
    /// Source map embedded in the bundle as a data URL.
    Inline,
    /// Separate `.map` files. Not supported by the dev server; rejected at
    /// startup by [`CompileOptions::validate`].
    External,
}

impl SourceMapMode {
    pub(crate) fn to_rolldown(self) -> Option<SourceMapType> {
        match self {
            SourceMapMode::None => None,
            SourceMapMode::Inline => Some(SourceMapType::Inline),
            SourceMapMode::External => Some(SourceMapType::File),
        }
    }
}

impl FromStr for SourceMapMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(SourceMapMode::None),
            "inline" => Ok(SourceMapMode::Inline),
            "external" => Ok(SourceMapMode::External),
            other => Err(Error::InvalidConfig(format!(
                "unknown sourcemap mode '{other}' (expected none, inline or external)"
            ))),
        }
    }
}

/// Loader kind for per-extension overrides (`--loader .ext:kind`).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Loader {
    Js,
    Jsx,
    Ts,
    Tsx,
    Json,
    Css,
    Text,
    /// Emit the file's public URL as the module's default export; the file
    /// itself is served by the raw passthrough when the browser fetches it.
    File,
}

impl Loader {
    /// Rolldown module type for content-based loaders. `File` is handled by
    /// the loader plugin itself and has no module type.
    pub(crate) fn module_type(self) -> Option<ModuleType> {
        match self {
            Loader::Js => Some(ModuleType::Js),
            Loader::Jsx => Some(ModuleType::Jsx),
            Loader::Ts => Some(ModuleType::Ts),
            Loader::Tsx => Some(ModuleType::Tsx),
            Loader::Json => Some(ModuleType::Json),
            Loader::Css => Some(ModuleType::Css),
            Loader::Text => Some(ModuleType::Text),
            Loader::File => None,
        }
    }
}

impl FromStr for Loader {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "js" => Ok(Loader::Js),
            "jsx" => Ok(Loader::Jsx),
            "ts" => Ok(Loader::Ts),
            "tsx" => Ok(Loader::Tsx),
            "json" => Ok(Loader::Json),
            "css" => Ok(Loader::Css),
            "text" => Ok(Loader::Text),
            "file" => Ok(Loader::File),
            other => Err(Error::InvalidConfig(format!(
                "unknown loader '{other}' (expected js, jsx, ts, tsx, json, css, text or file)"
            ))),
        }
    }
}

/// Per-process compiler configuration, loaded once at startup.
#[derive(Clone, Debug, Default)]
pub struct CompileOptions {
    /// Module format of generated bundles.
    pub format: ModuleFormat,
    /// Source map mode.
    pub sourcemap: SourceMapMode,
    /// Enable minification.
    pub minify: bool,
    /// Import specifiers to leave unresolved.
    pub external: Vec<String>,
    /// Prefix for URLs emitted by the `file` loader.
    pub public_path: Option<String>,
    /// Global identifier substitutions: `(name, replacement JS expression)`.
    pub defines: Vec<(String, String)>,
    /// Loader overrides keyed by dotted extension (`.svg`).
    pub loaders: Vec<(String, Loader)>,
}

impl CompileOptions {
    /// Reject option combinations the dev server cannot serve correctly.
    ///
    /// Called once at startup, before the server binds; a bad configuration
    /// must never make it into request handling.
    pub fn validate(&self) -> Result<()> {
        if self.sourcemap == SourceMapMode::External {
            return Err(Error::Unsupported(
                "external source maps are not supported by the dev server (use inline)".into(),
            ));
        }
        for (ext, _) in &self.loaders {
            if !ext.starts_with('.') || ext.len() < 2 {
                return Err(Error::InvalidConfig(format!(
                    "loader extension '{ext}' must start with a dot"
                )));
            }
        }
        Ok(())
    }
}
