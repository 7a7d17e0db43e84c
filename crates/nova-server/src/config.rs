//! Server configuration.

use nova_bundler::CompileOptions;
use path_clean::PathClean;
use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

/// Configuration for one dev server process.
#[derive(Clone, Debug)]
pub struct ServeConfig {
    /// Directory served as the site root. Must exist.
    pub root: PathBuf,
    /// TCP port to bind on all interfaces.
    pub port: u16,
    /// Compiler configuration shared by every script request.
    pub compile: CompileOptions,
    /// Requested code splitting. Always rejected; the dev server serves one
    /// self-contained bundle per entrypoint.
    pub splitting: bool,
    /// Requested output naming pattern. Always rejected; bundles are never
    /// written to disk.
    pub naming: Option<String>,
    /// Evict watchers idle longer than this. `None` disables eviction.
    pub watch_reap: Option<Duration>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            port: 3000,
            compile: CompileOptions::default(),
            splitting: false,
            naming: None,
            watch_reap: None,
        }
    }
}

impl ServeConfig {
    /// Reject configurations the server cannot honor. Runs once before the
    /// listener binds; nothing here is recoverable at request time.
    pub fn validate(&self) -> Result<()> {
        if self.splitting {
            return Err(Error::InvalidConfig(
                "code splitting is not supported; each entrypoint is served as one bundle".into(),
            ));
        }
        if let Some(naming) = &self.naming {
            return Err(Error::InvalidConfig(format!(
                "output naming ('{naming}') is not supported; bundles are served, not written"
            )));
        }
        if !self.root.is_dir() {
            return Err(Error::InvalidConfig(format!(
                "root directory does not exist: {}",
                self.root.display()
            )));
        }
        self.compile.validate()?;
        Ok(())
    }

    /// Pin the root to one absolute, dot-free spelling. Resolved request
    /// paths, watch keys and reload topics are all derived from the root,
    /// so they only agree when it has a single canonical form.
    pub fn absolutize_root(&mut self) {
        let root = std::mem::take(&mut self.root);
        self.root = std::path::absolute(&root).unwrap_or(root).clean();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> ServeConfig {
        ServeConfig {
            root: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_default() {
        let dir = tempfile::tempdir().unwrap();
        assert!(config_in(dir.path()).validate().is_ok());
    }

    #[test]
    fn test_splitting_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServeConfig {
            splitting: true,
            ..config_in(dir.path())
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_naming_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServeConfig {
            naming: Some("[dir]/[name].[ext]".into()),
            ..config_in(dir.path())
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_absolutize_root() {
        let mut config = ServeConfig::default();
        config.absolutize_root();
        assert!(config.root.is_absolute());

        let mut config = ServeConfig {
            root: PathBuf::from("/srv/./site/sub/.."),
            ..Default::default()
        };
        config.absolutize_root();
        assert_eq!(config.root, PathBuf::from("/srv/site"));
    }

    #[test]
    fn test_missing_root_rejected() {
        let config = ServeConfig {
            root: PathBuf::from("/definitely/not/a/real/dir"),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
