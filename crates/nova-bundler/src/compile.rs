//! On-demand bundle compilation.
//!
//! One [`compile`] call per script request. Each call builds a fresh
//! Rolldown bundler with the request's entrypoint, runs it in memory and
//! reports what happened through [`CompileOutcome`] instead of the error
//! channel: a page with a syntax error is still a page the server must
//! respond to.

use path_clean::PathClean;
use rolldown::{
    Bundler, BundlerBuilder, BundlerOptions, InputItem, IsExternal, Platform, RawMinifyOptions,
    ResolveOptions,
};
use rolldown_common::Output;
use rolldown_plugin::__inner::SharedPluginable;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::collect::DepCollectPlugin;
use crate::define::DefinePlugin;
use crate::diagnostics::{self, Diagnostic};
use crate::loaders::LoaderPlugin;
use crate::options::CompileOptions;
use crate::Result;

/// Result of compiling one entrypoint.
#[derive(Debug, Clone, Default)]
pub struct CompileOutcome {
    /// Generated bundle source. `None` when the compile failed.
    pub code: Option<String>,
    /// Diagnostics produced by the compile. Non-empty iff `code` is `None`.
    pub diagnostics: Vec<Diagnostic>,
    /// Every local file the bundle depends on, entrypoint included. Sorted,
    /// deduplicated, absolute.
    pub dependencies: Vec<PathBuf>,
}

impl CompileOutcome {
    pub fn succeeded(&self) -> bool {
        self.code.is_some()
    }

    fn failure(diagnostics: Vec<Diagnostic>, dependencies: Vec<PathBuf>) -> Self {
        Self {
            code: None,
            diagnostics,
            dependencies,
        }
    }
}

/// Compile `entry` into a single in-memory bundle rooted at `root`.
///
/// Build failures become a [`CompileOutcome`] with diagnostics; the `Err`
/// branch is reserved for configuration problems caught before the bundler
/// runs.
pub async fn compile(
    options: &CompileOptions,
    entry: &Path,
    root: &Path,
) -> Result<CompileOutcome> {
    options.validate()?;

    let entry_id = entry.to_path_buf().clean().to_string_lossy().into_owned();
    debug!(entry = %entry_id, "compiling entrypoint");

    let collector = Arc::new(DepCollectPlugin::new());
    let loader_plugin = Arc::new(LoaderPlugin::new(
        options.loaders.iter().cloned(),
        options.public_path.as_deref(),
        root,
    ));
    let define_plugin = Arc::new(DefinePlugin::new(
        options
            .defines
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str())),
    )?);

    let plugins: Vec<SharedPluginable> = vec![collector.clone(), loader_plugin, define_plugin];

    let bundler_options = configure_bundler_options(options, &entry_id, root);

    let mut bundler = match build_bundler(bundler_options, plugins) {
        Ok(bundler) => bundler,
        Err(diags) => return Ok(CompileOutcome::failure(diags, collector.take())),
    };

    let bundle = match bundler.generate().await {
        Ok(bundle) => bundle,
        Err(e) => {
            return Ok(CompileOutcome::failure(
                diagnostics::extract(&e),
                collector.take(),
            ));
        }
    };

    let code = bundle.assets.iter().find_map(|asset| {
        if let Output::Chunk(chunk) = asset {
            Some(chunk.code.clone())
        } else {
            None
        }
    });

    let dependencies = collector.take();
    match code {
        Some(code) => Ok(CompileOutcome {
            code: Some(code),
            diagnostics: Vec::new(),
            dependencies,
        }),
        None => Ok(CompileOutcome::failure(
            vec![Diagnostic {
                message: format!("bundler produced no output chunk for {entry_id}"),
                file: Some(entry_id),
                line: None,
                column: None,
            }],
            dependencies,
        )),
    }
}

fn build_bundler(
    options: BundlerOptions,
    plugins: Vec<SharedPluginable>,
) -> std::result::Result<Bundler, Vec<Diagnostic>> {
    BundlerBuilder::default()
        .with_options(options)
        .with_plugins(plugins)
        .build()
        .map_err(|e| diagnostics::extract(&e))
}

fn configure_bundler_options(
    options: &CompileOptions,
    entry_id: &str,
    root: &Path,
) -> BundlerOptions {
    BundlerOptions {
        input: Some(vec![InputItem {
            name: None,
            import: entry_id.to_string(),
        }]),
        format: Some(options.format.to_rolldown()),
        sourcemap: options.sourcemap.to_rolldown(),
        platform: Some(Platform::Browser),
        cwd: Some(root.to_path_buf()),
        external: Some(IsExternal::from(options.external.clone())),
        minify: options.minify.then(|| RawMinifyOptions::from(true)),
        resolve: Some(configure_resolution(root)),
        ..Default::default()
    }
}

/// Module resolution mirroring a browser-targeted bundler setup: walk the
/// node_modules chain upward from the server root.
fn configure_resolution(root: &Path) -> ResolveOptions {
    let mut modules = Vec::new();
    let mut current = root;
    loop {
        modules.push(current.join("node_modules").to_string_lossy().to_string());
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    modules.push("node_modules".to_string());

    ResolveOptions {
        main_fields: Some(vec![
            "browser".to_string(),
            "module".to_string(),
            "main".to_string(),
        ]),
        condition_names: Some(vec![
            "browser".to_string(),
            "import".to_string(),
            "default".to_string(),
        ]),
        extensions: Some(vec![
            ".js".to_string(),
            ".json".to_string(),
            ".mjs".to_string(),
            ".ts".to_string(),
            ".tsx".to_string(),
            ".jsx".to_string(),
        ]),
        modules: Some(modules),
        symlinks: Some(true),
        ..Default::default()
    }
}
