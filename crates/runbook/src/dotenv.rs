// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `.env` file loading (§6): `KEY=VALUE`, `#` comments, optional
//! `"`/`'` quoting.

use crate::error::RunbookError;
use std::collections::HashMap;
use std::path::Path;

/// Parse `.env` content into an ordered key/value map.
///
/// Blank lines and lines starting with `#` (after trimming) are ignored.
/// Values may be wrapped in matching `"` or `'` quotes, which are
/// stripped; unquoted values are trimmed of surrounding whitespace.
pub fn parse(content: &str, path: &str) -> Result<HashMap<String, String>, RunbookError> {
    let mut vars = HashMap::new();
    for (idx, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(RunbookError::MalformedDotenv {
                path: path.to_string(),
                line: idx + 1,
                text: raw_line.to_string(),
            });
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(RunbookError::MalformedDotenv {
                path: path.to_string(),
                line: idx + 1,
                text: raw_line.to_string(),
            });
        }
        vars.insert(key.to_string(), unquote(value.trim()));
    }
    Ok(vars)
}

fn unquote(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

/// Read and parse a `.env` file from disk.
pub fn load(path: &Path) -> Result<HashMap<String, String>, RunbookError> {
    let content = std::fs::read_to_string(path)
        .map_err(|source| RunbookError::Io { path: path.display().to_string(), source })?;
    parse(&content, &path.display().to_string())
}
