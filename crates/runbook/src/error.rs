// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors from config loading.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunbookError {
    #[error("io error reading {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },

    #[error("invalid TOML in {path}: {source}")]
    Toml { path: String, #[source] source: toml::de::Error },

    #[error("{path}:{line}: malformed .env entry: {text}")]
    MalformedDotenv { path: String, line: usize, text: String },
}
