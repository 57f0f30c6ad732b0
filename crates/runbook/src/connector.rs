// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connector config loading (§3, §6): named credential/config blobs with
//! `{name}` variable references resolved against the K/V config store at
//! load time.

use crate::error::RunbookError;
use crate::template::interpolate_json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sift_core::Connector;
use std::collections::HashMap;
use std::path::Path;

#[derive(Deserialize)]
struct RawConnector {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    config: serde_json::Value,
}

/// Parse one connector TOML document, substituting `{name}` references
/// in `config` against `vars` (typically a snapshot of the config
/// store's key/value pairs).
pub fn parse(content: &str, path: &str, vars: &HashMap<String, String>, now: DateTime<Utc>) -> Result<Connector, RunbookError> {
    let raw: RawConnector =
        toml::from_str(content).map_err(|source| RunbookError::Toml { path: path.to_string(), source })?;
    let config = interpolate_json(&raw.config, vars);
    Ok(Connector::new(raw.name, raw.kind, config, now))
}

/// Read and parse a connector file from disk.
pub fn load(path: &Path, vars: &HashMap<String, String>, now: DateTime<Utc>) -> Result<Connector, RunbookError> {
    let content = std::fs::read_to_string(path)
        .map_err(|source| RunbookError::Io { path: path.display().to_string(), source })?;
    parse(&content, &path.display().to_string(), vars, now)
}

/// Recursively load every `.toml` connector file under `dir`, skipping
/// and logging files that fail to parse.
pub fn load_dir(dir: &Path, vars: &HashMap<String, String>, now: DateTime<Utc>) -> Vec<Connector> {
    let mut connectors = Vec::new();
    if !dir.exists() {
        return connectors;
    }
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&current) else { continue };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            match load(&path, vars, now) {
                Ok(c) => connectors.push(c),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping invalid connector config"),
            }
        }
    }
    connectors.sort_by(|a, b| a.name.cmp(&b.name));
    connectors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_variable_reference_in_config() {
        let toml = r#"
            name = "github-main"
            type = "github"
            config = { token = "{github.token}" }
        "#;
        let vars = [("github.token".to_string(), "secret".to_string())].into_iter().collect();
        let c = parse(toml, "github.toml", &vars, Utc::now()).unwrap();
        assert_eq!(c.kind, "github");
        assert_eq!(c.config["token"], "secret");
    }

    #[test]
    fn unresolved_reference_is_left_as_is() {
        let toml = r#"
            name = "github-main"
            type = "github"
            config = { token = "{missing.var}" }
        "#;
        let c = parse(toml, "github.toml", &HashMap::new(), Utc::now()).unwrap();
        assert_eq!(c.config["token"], "{missing.var}");
    }
}
