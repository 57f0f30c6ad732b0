// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `{name}` variable substitution (§6) used by connector config loading.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Pattern for `{variable_name}` or `{namespace.variable_name}`.
#[allow(clippy::expect_used)]
static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_-]*)*)\}")
        .expect("constant regex pattern is valid")
});

/// Substitute `{name}` placeholders with values from `vars`.
///
/// Unknown references are left as-is rather than erroring, matching the
/// config store's tolerance of missing keys elsewhere.
pub fn interpolate(template: &str, vars: &HashMap<String, String>) -> String {
    VAR_PATTERN
        .replace_all(template, |caps: &regex::Captures| match vars.get(&caps[1]) {
            Some(val) => val.clone(),
            None => caps[0].to_string(),
        })
        .to_string()
}

/// Recursively substitute `{name}` placeholders in every string leaf of
/// a JSON value, used for connector `config` blobs.
pub fn interpolate_json(value: &serde_json::Value, vars: &HashMap<String, String>) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => serde_json::Value::String(interpolate(s, vars)),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(|v| interpolate_json(v, vars)).collect())
        }
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter().map(|(k, v)| (k.clone(), interpolate_json(v, vars))).collect(),
        ),
        other => other.clone(),
    }
}
