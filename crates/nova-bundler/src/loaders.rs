//! Per-extension loader overrides.
//!
//! Implements the `--loader .ext:kind` configuration as a Rolldown load
//! hook. Content loaders read the file and hand it to the bundler with an
//! overridden module type; the `file` loader instead emits the asset's
//! public URL as the module's default export, so the browser fetches the
//! file through the dev server's raw passthrough.

use anyhow::Context;
use rolldown_common::ModuleType;
use rolldown_plugin::{
    HookLoadArgs, HookLoadOutput, HookLoadReturn, HookUsage, Plugin, PluginContext,
};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

use crate::options::Loader;

/// Plugin applying configured loader overrides during module loading.
#[derive(Debug)]
pub struct LoaderPlugin {
    /// Overrides keyed by dotted extension (`.svg`).
    overrides: FxHashMap<String, Loader>,
    /// Prefix for URLs emitted by the `file` loader.
    public_path: String,
    /// Server root; asset URLs are derived relative to it.
    root: PathBuf,
}

impl LoaderPlugin {
    pub fn new(
        overrides: impl IntoIterator<Item = (String, Loader)>,
        public_path: Option<&str>,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            overrides: overrides.into_iter().collect(),
            public_path: public_path.unwrap_or("").trim_end_matches('/').to_string(),
            root: root.into(),
        }
    }

    fn loader_for(&self, id: &str) -> Option<Loader> {
        let ext = Path::new(id).extension()?.to_str()?;
        self.overrides.get(&format!(".{ext}")).copied()
    }

    /// Public URL for an asset handled by the `file` loader.
    fn file_url(&self, id: &str) -> String {
        let relative = Path::new(id)
            .strip_prefix(&self.root)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|_| Path::new(id).to_string_lossy().replace('\\', "/"));
        format!("{}/{}", self.public_path, relative.trim_start_matches('/'))
    }
}

impl Plugin for LoaderPlugin {
    fn name(&self) -> std::borrow::Cow<'static, str> {
        "nova-loaders".into()
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::Load
    }

    fn load(
        &self,
        _ctx: &PluginContext,
        args: &HookLoadArgs<'_>,
    ) -> impl std::future::Future<Output = HookLoadReturn> + Send {
        let id = args.id.to_string();
        let loader = if id.starts_with('\0') {
            None
        } else {
            self.loader_for(&id)
        };
        let url = matches!(loader, Some(Loader::File)).then(|| self.file_url(&id));

        async move {
            let Some(loader) = loader else {
                return Ok(None);
            };

            if let Some(url) = url {
                let code = format!("export default {};", serde_json::to_string(&url)?);
                return Ok(Some(HookLoadOutput {
                    code: code.into(),
                    module_type: Some(ModuleType::Js),
                    ..Default::default()
                }));
            }

            let source = tokio::fs::read_to_string(&id)
                .await
                .with_context(|| format!("failed to read module for loader override: {id}"))?;

            Ok(Some(HookLoadOutput {
                code: source.into(),
                module_type: loader.module_type(),
                ..Default::default()
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plugin() -> LoaderPlugin {
        LoaderPlugin::new(
            vec![(".svg".to_string(), Loader::File), (".md".to_string(), Loader::Text)],
            Some("/static/"),
            "/project",
        )
    }

    #[test]
    fn test_loader_lookup_by_extension() {
        let p = plugin();
        assert_eq!(p.loader_for("/project/logo.svg"), Some(Loader::File));
        assert_eq!(p.loader_for("/project/README.md"), Some(Loader::Text));
        assert_eq!(p.loader_for("/project/src/index.ts"), None);
        assert_eq!(p.loader_for("/project/LICENSE"), None);
    }

    #[test]
    fn test_file_url_is_public_path_prefixed() {
        let p = plugin();
        assert_eq!(p.file_url("/project/img/logo.svg"), "/static/img/logo.svg");
    }

    #[test]
    fn test_file_url_outside_root_keeps_absolute_path() {
        let p = plugin();
        assert_eq!(p.file_url("/other/logo.svg"), "/static/other/logo.svg");
    }

    #[test]
    fn test_empty_public_path() {
        let p = LoaderPlugin::new(vec![], None, "/project");
        assert_eq!(p.file_url("/project/a.png"), "/a.png");
    }
}
