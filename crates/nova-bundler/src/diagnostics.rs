//! Diagnostic extraction from Rolldown errors.
//!
//! Rolldown reports build failures through error types whose structure is
//! not stable across versions. We parse their Debug representation into a
//! small serializable shape, which insulates the serving layer from
//! upstream changes. The browser only needs a message and, when present, a
//! file position.

use serde::Serialize;

/// One compile diagnostic, stable and serializable.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

/// Extract diagnostics from a Rolldown error.
///
/// Batched errors carry several diagnostics in one value; they are split
/// apart so each reaches the browser individually.
pub fn extract(error: &dyn std::fmt::Debug) -> Vec<Diagnostic> {
    let error_str = format!("{error:?}");

    if error_str.contains("BatchedBuildDiagnostic") {
        let parts: Vec<&str> = error_str
            .split("BuildDiagnostic")
            .filter(|s| !s.trim().is_empty())
            .collect();
        if parts.len() > 1 {
            return parts.iter().map(|part| extract_single(part)).collect();
        }
    }

    vec![extract_single(&error_str)]
}

fn extract_single(error_str: &str) -> Diagnostic {
    Diagnostic {
        message: error_str.trim().to_string(),
        file: extract_file_path(error_str),
        line: extract_line_number(error_str),
        column: extract_column_number(error_str),
    }
}

/// Find a source file path in a formatted error message.
fn extract_file_path(text: &str) -> Option<String> {
    for ext in &[".js", ".ts", ".jsx", ".tsx", ".mjs", ".cjs"] {
        if let Some(pos) = text.find(ext) {
            let before = &text[..=pos + ext.len() - 1];
            for indicator in &["in ", "at ", "file: ", "path: ", "\"", "'"] {
                if let Some(start) = before.rfind(indicator) {
                    let path_start = start + indicator.len();
                    let candidate = before[path_start..].trim().trim_matches(['"', '\'']);
                    if !candidate.is_empty() {
                        return Some(candidate.to_string());
                    }
                }
            }
        }
    }
    None
}

/// Find a `line:column` or `line N` position in a formatted error message.
fn extract_line_number(text: &str) -> Option<u32> {
    if let Some(pos) = text.find("line ") {
        return parse_leading_number(&text[pos + 5..]);
    }
    line_col_pair(text).map(|(line, _)| line)
}

fn extract_column_number(text: &str) -> Option<u32> {
    if let Some(pos) = text.find("column ") {
        return parse_leading_number(&text[pos + 7..]);
    }
    line_col_pair(text).and_then(|(_, col)| col)
}

/// Parse a `:12:34` style position suffix anywhere in the text.
fn line_col_pair(text: &str) -> Option<(u32, Option<u32>)> {
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != ':' {
            continue;
        }
        let rest = &text[i + 1..];
        let Some(line) = parse_leading_number(rest) else {
            continue;
        };
        let after_line = &rest[count_digits(rest)..];
        let column = after_line
            .strip_prefix(':')
            .and_then(parse_leading_number_ref);
        return Some((line, column));
    }
    None
}

fn count_digits(s: &str) -> usize {
    s.chars().take_while(|c| c.is_ascii_digit()).count()
}

fn parse_leading_number(s: &str) -> Option<u32> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn parse_leading_number_ref(s: &str) -> Option<u32> {
    parse_leading_number(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FakeError(&'static str);

    #[test]
    fn test_single_error_with_position() {
        let err = FakeError("Parse error at \"/app/src/index.ts:3:14\": Expected ';'");
        let diags = extract(&err);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].file.as_deref(), Some("/app/src/index.ts"));
        assert_eq!(diags[0].line, Some(3));
        assert_eq!(diags[0].column, Some(14));
    }

    #[test]
    fn test_batched_errors_split() {
        let err = FakeError(
            "BatchedBuildDiagnostic [BuildDiagnostic in a.ts: bad, BuildDiagnostic in b.ts: worse]",
        );
        let diags = extract(&err);
        assert!(diags.len() >= 2);
    }

    #[test]
    fn test_message_never_empty() {
        let err = FakeError("something went wrong");
        let diags = extract(&err);
        assert_eq!(diags[0].message, "something went wrong");
        assert!(diags[0].file.is_none());
    }
}
