// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Variables file loading (§6): `[key] value = "…" description = "…"`.

use crate::error::RunbookError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// One entry in a loaded variables file, ready to be written into the
/// config store via `ConfigStore::set`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableEntry {
    pub key: String,
    pub value: String,
    pub description: String,
}

#[derive(Deserialize)]
struct RawEntry {
    value: String,
    #[serde(default)]
    description: String,
}

/// Parse a variables file's TOML content into entries, in file order.
pub fn parse(content: &str, path: &str) -> Result<Vec<VariableEntry>, RunbookError> {
    let raw: BTreeMap<String, RawEntry> =
        toml::from_str(content).map_err(|source| RunbookError::Toml { path: path.to_string(), source })?;
    Ok(raw
        .into_iter()
        .map(|(key, entry)| VariableEntry { key, value: entry.value, description: entry.description })
        .collect())
}

/// Read and parse a variables file from disk.
pub fn load(path: &Path) -> Result<Vec<VariableEntry>, RunbookError> {
    let content = std::fs::read_to_string(path)
        .map_err(|source| RunbookError::Io { path: path.display().to_string(), source })?;
    parse(&content, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_value_and_description() {
        let toml = r#"
            ["api.token"]
            value = "secret"
            description = "GitHub API token"

            ["poll.interval"]
            value = "300"
        "#;
        let entries = parse(toml, "vars.toml").unwrap();
        let token = entries.iter().find(|e| e.key == "api.token").unwrap();
        assert_eq!(token.value, "secret");
        assert_eq!(token.description, "GitHub API token");
        let interval = entries.iter().find(|e| e.key == "poll.interval").unwrap();
        assert_eq!(interval.description, "");
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(parse("not valid = = toml", "vars.toml").is_err());
    }
}
