//! Dependency collection during a single compile.
//!
//! The dev server needs to know every local file a bundle depends on so it
//! can watch them and tell the browser which reload topics to subscribe to.
//! Rather than re-walking the module graph, this plugin observes Rolldown's
//! own load hook: every module the bundler actually touches passes through
//! here exactly once per compile.

use parking_lot::Mutex;
use rolldown_plugin::{HookLoadArgs, HookLoadReturn, HookUsage, Plugin, PluginContext};
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Plugin that records every local-filesystem module id seen during one
/// compile. Create one per compile request; the set is request-scoped.
#[derive(Debug, Default)]
pub struct DepCollectPlugin {
    seen: Arc<Mutex<FxHashSet<PathBuf>>>,
}

impl DepCollectPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the collected dependency set.
    pub fn take(&self) -> Vec<PathBuf> {
        let mut seen = self.seen.lock();
        let mut deps: Vec<PathBuf> = std::mem::take(&mut *seen).into_iter().collect();
        deps.sort();
        deps
    }
}

/// Whether a module id refers to a file on the local filesystem.
///
/// Virtual modules carry a `\0` namespace prefix and third-party modules
/// resolve into `node_modules`; neither is something the dev server should
/// watch.
fn is_local_module(id: &str) -> bool {
    !id.starts_with('\0')
        && !id.contains("node_modules")
        && Path::new(id).is_absolute()
}

impl Plugin for DepCollectPlugin {
    fn name(&self) -> std::borrow::Cow<'static, str> {
        "nova-dep-collect".into()
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::Load
    }

    fn load(
        &self,
        _ctx: &PluginContext,
        args: &HookLoadArgs<'_>,
    ) -> impl std::future::Future<Output = HookLoadReturn> + Send {
        let seen = Arc::clone(&self.seen);
        let id = args.id.to_string();

        async move {
            if is_local_module(&id) {
                seen.lock().insert(PathBuf::from(id));
            }
            // Never modify load behavior; observation only.
            Ok(None)
        }
    }
}
