//! Script entrypoint responses.
//!
//! A script request compiles the entrypoint and wraps the result so the
//! browser's reload channel ends up subscribed to the bundle's whole
//! module graph. A failed compile still answers with executable script:
//! the subscription preamble is identical and the bundle body is replaced
//! by console diagnostics, so the page keeps reloading and picks up the
//! next successful build on its own.

use nova_bundler::{compile, CompileOptions, Diagnostic};
use path_clean::PathClean;
use std::path::{Path, PathBuf};

use crate::watch::topic_for;
use crate::Result;

/// Compiled response body plus the files it depends on.
#[derive(Debug)]
pub struct ScriptResponse {
    pub body: String,
    /// True when the bundle failed and the body carries diagnostics.
    pub failed: bool,
    /// Absolute paths to register with the watch registry.
    pub dependencies: Vec<PathBuf>,
}

/// Compile `entry` and build the script response for it.
pub async fn compile_script(
    options: &CompileOptions,
    entry: &Path,
    root: &Path,
) -> Result<ScriptResponse> {
    // The compiler reports cleaned absolute module ids; clean the entry the
    // same way so its spelling never produces a second dependency.
    let entry = entry.clean();
    let outcome = compile(options, &entry, root).await?;

    let mut dependencies = outcome.dependencies;
    if !dependencies.contains(&entry) {
        dependencies.push(entry);
    }

    let topics: Vec<String> = dependencies
        .iter()
        .map(|dep| topic_for(root, dep))
        .collect();
    let preamble = subscription_preamble(&topics);

    match outcome.code {
        Some(code) => Ok(ScriptResponse {
            body: format!("{preamble}{code}"),
            failed: false,
            dependencies,
        }),
        None => Ok(ScriptResponse {
            body: format!("{preamble}{}", render_failure_script(&outcome.diagnostics)),
            failed: true,
            dependencies,
        }),
    }
}

/// Subscription call executed before the bundle body. The optional-call
/// form tolerates a bundle loaded outside a page that carries the
/// bootstrap (direct fetch, worker).
fn subscription_preamble(topics: &[String]) -> String {
    let topics = serde_json::to_string(topics).unwrap_or_else(|_| "[]".into());
    format!("globalThis.__nova_hmr?.({topics});\n")
}

/// Script body reporting compile diagnostics to the browser console.
fn render_failure_script(diagnostics: &[Diagnostic]) -> String {
    let mut body = String::from("console.error(\"[nova] build failed\");\n");
    for diag in diagnostics {
        let mut message = String::new();
        if let Some(file) = &diag.file {
            message.push_str(file);
            if let Some(line) = diag.line {
                message.push_str(&format!(":{line}"));
                if let Some(column) = diag.column {
                    message.push_str(&format!(":{column}"));
                }
            }
            message.push_str(": ");
        }
        message.push_str(&diag.message);

        let escaped = serde_json::to_string(&message).unwrap_or_else(|_| "\"\"".into());
        body.push_str(&format!("console.error({escaped});\n"));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(message: &str, file: Option<&str>, line: Option<u32>, column: Option<u32>) -> Diagnostic {
        Diagnostic {
            message: message.to_string(),
            file: file.map(String::from),
            line,
            column,
        }
    }

    #[test]
    fn test_failure_script_carries_each_diagnostic() {
        let body = render_failure_script(&[
            diag("Expected ';'", Some("src/a.ts"), Some(3), Some(14)),
            diag("Cannot resolve './x'", None, None, None),
        ]);
        assert!(body.contains(r#"console.error("src/a.ts:3:14: Expected ';'");"#));
        assert!(body.contains(r#"Cannot resolve"#));
    }

    #[test]
    fn test_failure_script_escapes_quotes() {
        let body = render_failure_script(&[diag("unexpected \"token\"", None, None, None)]);
        assert!(body.contains(r#"console.error("unexpected \"token\"");"#));
    }

    #[test]
    fn test_preamble_lists_topics() {
        let preamble =
            subscription_preamble(&["src/app.ts".to_string(), "src/util.ts".to_string()]);
        assert_eq!(
            preamble,
            "globalThis.__nova_hmr?.([\"src/app.ts\",\"src/util.ts\"]);\n"
        );
    }

    #[tokio::test]
    async fn test_compile_failure_still_subscribes() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("broken.ts");
        std::fs::write(&entry, "const = ;\n").unwrap();

        let response = compile_script(&CompileOptions::default(), &entry, dir.path())
            .await
            .unwrap();

        assert!(response.failed);
        assert!(response.body.starts_with("globalThis.__nova_hmr?.("));
        assert!(response.body.contains("broken.ts"));
        assert!(response.dependencies.contains(&entry));
    }

    #[tokio::test]
    async fn test_entry_spelling_does_not_duplicate_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.ts"), "console.log(1);\n").unwrap();

        // Same file, reached through a redundant path segment.
        let spelled = dir.path().join("sub/../index.ts");
        let response = compile_script(&CompileOptions::default(), &spelled, dir.path())
            .await
            .unwrap();

        let entries = response
            .dependencies
            .iter()
            .filter(|dep| dep.ends_with("index.ts"))
            .count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_compile_success_prepends_subscription() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("index.ts");
        std::fs::write(&entry, "console.log(1);\n").unwrap();

        let response = compile_script(&CompileOptions::default(), &entry, dir.path())
            .await
            .unwrap();

        assert!(!response.failed);
        assert!(response.body.contains("__nova_hmr?.([\"index.ts\"]"));
        assert!(response.body.contains("console.log"));
    }
}
