//! Prompt template rendering
//!
//! Templates use `{{name}}` placeholders. Rendering is a single pass over the
//! template: substituted values are never scanned again, so a value that itself
//! contains `{{...}}` is inserted literally. Unknown or empty placeholders
//! render as the empty string.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Regex to match placeholders: {{name}}
static PLACEHOLDER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{(\w+)\}\}").unwrap());

/// Render a template against a single value map
pub fn render_template(template: &str, values: &HashMap<String, String>) -> String {
    render_with(template, |name| values.get(name).map(String::as_str))
}

/// Render a template, looking each placeholder up through `lookup`
///
/// `lookup` returning `None` or an empty string yields an empty substitution.
pub fn render_with<'a, F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<&'a str>,
{
    PLACEHOLDER_PATTERN
        .replace_all(template, |caps: &Captures<'_>| {
            lookup(&caps[1]).unwrap_or_default().to_string()
        })
        .into_owned()
}

/// Extract distinct placeholder names in order of first appearance
pub fn extract_placeholders(template: &str) -> Vec<String> {
    let mut seen = HashSet::new();

    PLACEHOLDER_PATTERN
        .captures_iter(template)
        .filter_map(|caps| {
            let name = caps[1].to_string();
            seen.insert(name.clone()).then_some(name)
        })
        .collect()
}
