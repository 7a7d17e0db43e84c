//! HTML rewriting: bootstrap injection and asset dependency discovery.

use indexmap::IndexSet;
use tracing::warn;

/// Result of rewriting one HTML document.
#[derive(Debug)]
pub struct HtmlTransform {
    /// Rewritten document with the bootstrap and subscription call injected.
    pub body: String,
    /// Local asset paths referenced via `src`/`srcset`, root-relative,
    /// deduplicated in discovery order.
    pub dependencies: Vec<String>,
}

/// Rewrite an HTML document for live reload.
///
/// The bootstrap script is injected exactly once, immediately before the
/// first `<script>` element; documents without any script tag get it
/// appended at the end instead. Asset references discovered in the
/// document are appended as a subscription call after the document, so the
/// page's reload channel also covers images and other static media.
///
/// Script elements are deliberately not treated as dependencies here:
/// compiled bundles report their own module graph once they load.
pub fn rewrite_document(input: &str, bootstrap: &str) -> HtmlTransform {
    let dependencies = collect_dependencies(input);

    let bootstrap_tag = format!("<script>{bootstrap}</script>");
    let mut body = match find_script_tag(input) {
        Some(pos) => {
            let mut out = String::with_capacity(input.len() + bootstrap_tag.len());
            out.push_str(&input[..pos]);
            out.push_str(&bootstrap_tag);
            out.push_str(&input[pos..]);
            out
        }
        None => {
            let mut out = String::with_capacity(input.len() + bootstrap_tag.len());
            out.push_str(input);
            out.push_str(&bootstrap_tag);
            out
        }
    };

    if !dependencies.is_empty() {
        // Optional call, same as the compiled-script preamble: the page
        // must keep rendering even if the bootstrap never ran.
        let topics = serde_json::to_string(&dependencies).unwrap_or_else(|_| "[]".into());
        body.push_str(&format!("<script>__nova_hmr?.({topics});</script>"));
    }

    HtmlTransform { body, dependencies }
}

/// Byte offset of the first `<script` tag open, case-insensitive.
///
/// Comment spans are stepped over so a commented-out script never attracts
/// the bootstrap; a script inside a comment would never execute it.
fn find_script_tag(input: &str) -> Option<usize> {
    let haystack = input.as_bytes();
    let needle = b"<script";
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(b"<!--") {
            let close = haystack[i + 4..].windows(3).position(|w| w == b"-->")?;
            i += 4 + close + 3;
            continue;
        }
        if haystack[i..]
            .get(..needle.len())
            .is_some_and(|w| w.eq_ignore_ascii_case(needle))
        {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Collect local `src`/`srcset` references from every non-script element.
///
/// The parse is lenient and per-element failures are logged rather than
/// propagated; partial discovery still produces a usable page.
fn collect_dependencies(input: &str) -> Vec<String> {
    let dom = match tl::parse(input, tl::ParserOptions::default()) {
        Ok(dom) => dom,
        Err(e) => {
            warn!(error = %e, "failed to parse HTML; skipping dependency discovery");
            return Vec::new();
        }
    };
    let mut deps: IndexSet<String> = IndexSet::new();
    for tag in dom.nodes().iter().filter_map(|node| node.as_tag()) {
        let name = tag.name().as_utf8_str().to_lowercase();
        if name == "script" {
            continue;
        }

        for (key, value) in tag.attributes().iter() {
            let key: &str = key.as_ref();
            let Some(value) = value else { continue };
            match key {
                "src" => record_dependency(&mut deps, &value),
                "srcset" => {
                    // Comma-separated candidates; each is "url [descriptor]".
                    for candidate in value.split(',') {
                        if let Some(url) = candidate.split_whitespace().next() {
                            record_dependency(&mut deps, url);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    deps.into_iter().collect()
}

fn record_dependency(deps: &mut IndexSet<String>, value: &str) {
    if value.is_empty() || is_remote(value) {
        return;
    }
    deps.insert(value.trim_start_matches('/').to_string());
}

/// Fully-qualified URLs (scheme-prefixed or protocol-relative) are served
/// by someone else and never watched.
fn is_remote(value: &str) -> bool {
    if value.starts_with("//") {
        return true;
    }
    // A scheme is a letter followed by letters, digits, '+', '-' or '.',
    // terminated by ':'.
    let mut chars = value.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    for (_, c) in chars {
        match c {
            ':' => return true,
            c if c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.') => {}
            _ => return false,
        }
    }
    false
}
