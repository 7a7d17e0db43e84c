//! Compile-time identifier substitution (`--define name=value`).

use regex::Regex;
use rolldown_plugin::{
    HookTransformArgs, HookTransformOutput, HookTransformReturn, HookUsage, Plugin, PluginContext,
    TransformPluginContext,
};
use std::sync::Arc;

use crate::{Error, Result};

/// One substitution rule: a whole-word match for the defined name.
#[derive(Debug)]
struct DefineRule {
    pattern: Regex,
    replacement: String,
}

/// Plugin replacing configured global identifiers with literal JS
/// expressions before the bundler parses each module.
#[derive(Debug, Default)]
pub struct DefinePlugin {
    rules: Vec<DefineRule>,
}

impl DefinePlugin {
    /// Build substitution rules from `(name, replacement)` pairs. Fails on
    /// names that cannot form a valid word-boundary pattern.
    pub fn new<'a>(defines: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let mut rules = Vec::new();
        for (name, replacement) in defines {
            let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(name)))
                .map_err(|e| Error::InvalidConfig(format!("invalid define name '{name}': {e}")))?;
            rules.push(DefineRule {
                pattern,
                replacement: replacement.to_string(),
            });
        }
        Ok(Self { rules })
    }

    /// Returns the substituted source, or `None` when nothing matched.
    fn apply(&self, source: &str) -> Option<String> {
        let mut output: Option<String> = None;
        for rule in &self.rules {
            let haystack = output.as_deref().unwrap_or(source);
            if !rule.pattern.is_match(haystack) {
                continue;
            }
            // NoExpand: replacement values are literal JS, '$' included.
            let replaced = rule
                .pattern
                .replace_all(haystack, regex::NoExpand(rule.replacement.as_str()))
                .into_owned();
            output = Some(replaced);
        }
        output
    }
}

impl Plugin for DefinePlugin {
    fn name(&self) -> std::borrow::Cow<'static, str> {
        "nova-define".into()
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::Transform
    }

    fn transform(
        &self,
        _ctx: Arc<TransformPluginContext>,
        args: &HookTransformArgs<'_>,
    ) -> impl std::future::Future<Output = HookTransformReturn> + Send {
        let replaced = self.apply(args.code);

        async move {
            let Some(code) = replaced else {
                return Ok(None);
            };
            Ok(Some(HookTransformOutput {
                code: Some(code),
                map: None,
                side_effects: None,
                module_type: None,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_word_substitution() {
        let plugin = DefinePlugin::new(vec![("DEBUG", "false")]).unwrap();
        assert_eq!(
            plugin.apply("if (DEBUG) log(DEBUGGER);").as_deref(),
            Some("if (false) log(DEBUGGER);")
        );
    }

    #[test]
    fn test_dotted_names() {
        let plugin =
            DefinePlugin::new(vec![("process.env.NODE_ENV", "\"development\"")]).unwrap();
        assert_eq!(
            plugin.apply("const env = process.env.NODE_ENV;").as_deref(),
            Some("const env = \"development\";")
        );
    }

    #[test]
    fn test_untouched_source_returns_none() {
        let plugin = DefinePlugin::new(vec![("DEBUG", "false")]).unwrap();
        assert_eq!(plugin.apply("const x = 1;"), None);
    }
}
