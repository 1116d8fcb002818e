//! `${KEY}` placeholder extraction, validation and substitution.
//!
//! Templates carry `${KEY}` tokens in their string leaves. This module finds
//! them, checks a caller's field-value map against them, and substitutes
//! values into a JSON tree.
//!
//! Substitution walks the parsed tree and rewrites string leaves only. Each
//! leaf is scanned once, so a value that itself looks like `${OTHER}` is
//! inserted literally and never expanded again. Object keys are left alone.

use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is valid"))
}

/// Collect the distinct `${KEY}` tokens found in any string leaf of `tree`.
///
/// Keys are returned in order of first appearance during a depth-first walk.
pub fn extract_placeholders(tree: &Value) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    collect(tree, &mut seen, &mut keys);
    keys
}

fn collect(value: &Value, seen: &mut HashSet<String>, keys: &mut Vec<String>) {
    match value {
        Value::String(text) => {
            for caps in token_regex().captures_iter(text) {
                let key = &caps[1];
                if seen.insert(key.to_string()) {
                    keys.push(key.to_string());
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect(item, seen, keys);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect(item, seen, keys);
            }
        }
        _ => {}
    }
}

/// Outcome of checking a field-value map against a set of placeholders.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Required keys with no entry in the map.
    pub missing: Vec<String>,
    /// Required keys whose value is empty or whitespace.
    pub empty: Vec<String>,
    /// Keys in the map that no placeholder references.
    ///
    /// Reported for the caller's benefit; they do not make the map invalid.
    pub extraneous: Vec<String>,
}

impl ValidationReport {
    /// A map is valid when every required key has a non-empty value.
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty() && self.empty.is_empty()
    }
}

/// Check `values` against the `required` placeholder keys.
///
/// `required` is typically the output of [`extract_placeholders`].
pub fn validate_field_values(
    required: &[String],
    values: &BTreeMap<String, String>,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    for key in required {
        match values.get(key) {
            None => report.missing.push(key.clone()),
            Some(value) if value.trim().is_empty() => report.empty.push(key.clone()),
            Some(_) => {}
        }
    }

    let known: HashSet<&str> = required.iter().map(String::as_str).collect();
    report.extraneous = values
        .keys()
        .filter(|key| !known.contains(key.as_str()))
        .cloned()
        .collect();

    report
}

/// Replace `${KEY}` tokens in every string leaf of `tree` with `values[KEY]`.
///
/// Tokens whose key is absent from `values` are left untouched and their
/// keys returned, distinct and in order of first appearance. Only the
/// template text is inspected, so a substituted value that happens to look
/// like a token is never reported.
pub fn substitute(tree: &mut Value, values: &BTreeMap<String, String>) -> Vec<String> {
    let mut unresolved = Vec::new();
    substitute_into(tree, values, &mut unresolved);
    unresolved
}

fn substitute_into(tree: &mut Value, values: &BTreeMap<String, String>, unresolved: &mut Vec<String>) {
    match tree {
        Value::String(text) => {
            if let Some(replaced) = substitute_str(text, values, unresolved) {
                *text = replaced;
            }
        }
        Value::Array(items) => {
            for item in items {
                substitute_into(item, values, unresolved);
            }
        }
        Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                substitute_into(item, values, unresolved);
            }
        }
        _ => {}
    }
}

fn substitute_str(
    text: &str,
    values: &BTreeMap<String, String>,
    unresolved: &mut Vec<String>,
) -> Option<String> {
    let regex = token_regex();
    if !regex.is_match(text) {
        return None;
    }
    let replaced = regex.replace_all(text, |caps: &Captures<'_>| match values.get(&caps[1]) {
        Some(value) => value.clone(),
        None => {
            if !unresolved.iter().any(|key| key == &caps[1]) {
                unresolved.push(caps[1].to_string());
            }
            caps[0].to_string()
        }
    });
    Some(replaced.into_owned())
}

/// Render a placeholder default as the text that gets substituted.
///
/// `null` becomes the empty string; numbers and booleans use their JSON text.
pub(crate) fn default_as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
