//! Command-line interface definition and conversion to server config.

use clap::Parser;
use nova_bundler::{CompileOptions, Loader, ModuleFormat, SourceMapMode};
use nova_server::ServeConfig;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CliError;

#[derive(Parser, Debug)]
#[command(
    name = "nova",
    version,
    about = "Development server with on-demand bundling and live reload"
)]
pub struct Cli {
    /// Port number to listen on
    #[arg(short = 'p', long, default_value_t = 3000)]
    pub port: u16,

    /// Directory to serve
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Module format for generated bundles (esm, cjs, iife)
    #[arg(long, default_value = "esm")]
    pub format: String,

    /// Enable code splitting (not supported; rejected at startup)
    #[arg(long)]
    pub splitting: bool,

    /// Sourcemap type to generate (none, inline, external)
    #[arg(long, default_value = "none")]
    pub sourcemap: String,

    /// Enable minification
    #[arg(short = 'm', long)]
    pub minify: bool,

    /// Import specifiers to treat as external
    #[arg(short = 'e', long = "external", value_name = "SPECIFIER")]
    pub external: Vec<String>,

    /// Prefix prepended to asset import paths in bundled code
    #[arg(long = "public-path", value_name = "PREFIX")]
    pub public_path: Option<String>,

    /// Define a global identifier replaced at build time; value is JSON
    #[arg(short = 'd', long = "define", value_name = "NAME=VALUE")]
    pub define: Vec<String>,

    /// Loader override for a file extension
    #[arg(short = 'l', long = "loader", value_name = ".EXT:LOADER")]
    pub loader: Vec<String>,

    /// Output naming pattern (not supported; rejected at startup)
    #[arg(long, value_name = "PATTERN")]
    pub naming: Option<String>,

    /// Evict file watchers idle for this many seconds
    #[arg(long = "watch-reap-secs", value_name = "SECS")]
    pub watch_reap_secs: Option<u64>,

    /// Enable debug-level logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Only show errors
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl Cli {
    /// Convert parsed flags into a validated-shape server configuration.
    /// Semantic validation (unsupported combinations, missing root) happens
    /// in [`ServeConfig::validate`] at startup.
    pub fn to_serve_config(&self) -> Result<ServeConfig, CliError> {
        let format: ModuleFormat = self
            .format
            .parse()
            .map_err(|e| CliError::InvalidArgument(format!("--format: {e}")))?;
        let sourcemap: SourceMapMode = self
            .sourcemap
            .parse()
            .map_err(|e| CliError::InvalidArgument(format!("--sourcemap: {e}")))?;

        let defines = self
            .define
            .iter()
            .map(|raw| parse_define(raw))
            .collect::<Result<Vec<_>, _>>()?;
        let loaders = self
            .loader
            .iter()
            .map(|raw| parse_loader(raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ServeConfig {
            root: self.root.clone(),
            port: self.port,
            compile: CompileOptions {
                format,
                sourcemap,
                minify: self.minify,
                external: self.external.clone(),
                public_path: self.public_path.clone(),
                defines,
                loaders,
            },
            splitting: self.splitting,
            naming: self.naming.clone(),
            watch_reap: self.watch_reap_secs.map(Duration::from_secs),
        })
    }
}

/// Parse one `--define NAME=VALUE` pair. The value must be valid JSON; the
/// JSON text is substituted verbatim as a JS expression.
fn parse_define(raw: &str) -> Result<(String, String), CliError> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| CliError::InvalidArgument(format!("--define '{raw}': expected NAME=VALUE")))?;
    if name.is_empty() {
        return Err(CliError::InvalidArgument(format!(
            "--define '{raw}': empty name"
        )));
    }
    let parsed: serde_json::Value = serde_json::from_str(value).map_err(|e| {
        CliError::InvalidArgument(format!("--define '{raw}': value is not valid JSON: {e}"))
    })?;
    Ok((name.to_string(), parsed.to_string()))
}

/// Parse one `--loader .EXT:LOADER` pair.
fn parse_loader(raw: &str) -> Result<(String, Loader), CliError> {
    let (ext, kind) = raw.split_once(':').ok_or_else(|| {
        CliError::InvalidArgument(format!("--loader '{raw}': expected .EXT:LOADER"))
    })?;
    let loader: Loader = kind
        .parse()
        .map_err(|e| CliError::InvalidArgument(format!("--loader '{raw}': {e}")))?;
    Ok((ext.to_string(), loader))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("nova").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).to_serve_config().unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.compile.format, ModuleFormat::Esm);
        assert!(!config.compile.minify);
        assert!(config.watch_reap.is_none());
    }

    #[test]
    fn test_define_value_is_json_parsed() {
        let config = parse(&["-d", r#"DEBUG=true"#, "-d", r#"NAME="dev""#])
            .to_serve_config()
            .unwrap();
        assert_eq!(
            config.compile.defines,
            vec![
                ("DEBUG".to_string(), "true".to_string()),
                ("NAME".to_string(), "\"dev\"".to_string()),
            ]
        );
    }

    #[test]
    fn test_define_rejects_bad_json() {
        let err = parse(&["-d", "DEBUG=yes"]).to_serve_config().unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument(_)));
    }

    #[test]
    fn test_define_requires_separator() {
        assert!(parse(&["-d", "DEBUG"]).to_serve_config().is_err());
    }

    #[test]
    fn test_loader_pairs() {
        let config = parse(&["-l", ".svg:file", "-l", ".md:text"])
            .to_serve_config()
            .unwrap();
        assert_eq!(
            config.compile.loaders,
            vec![
                (".svg".to_string(), Loader::File),
                (".md".to_string(), Loader::Text),
            ]
        );
    }

    #[test]
    fn test_loader_rejects_unknown_kind() {
        assert!(parse(&["-l", ".svg:vector"]).to_serve_config().is_err());
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(parse(&["--format", "umd"]).to_serve_config().is_err());
    }
}
