// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon boot configuration: where the data directory and the config
//! root (job definitions, connectors, variables, `.env`) live, and the
//! startup reset knobs §6 "Persisted layout" names.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },

    #[error("parsing {path}: {source}")]
    Parse { path: String, #[source] source: toml::de::Error },
}

/// Resolve the default data directory: `SIFT_STATE_DIR` >
/// `XDG_STATE_HOME/sift` > `~/.local/state/sift`.
pub fn default_state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SIFT_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("sift");
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".local/state/sift")
}

/// The on-disk shape of the daemon's own TOML config file, distinct
/// from the job-definition/connector/variable files `sift-runbook`
/// loads from `config_root` (§6).
#[derive(Debug, Clone, Deserialize, Default)]
struct RawDaemonConfig {
    data_dir: Option<PathBuf>,
    config_root: Option<PathBuf>,
    #[serde(default)]
    reset_on_startup: bool,
    #[serde(default)]
    delete_on_startup: Vec<String>,
}

/// Boot configuration (§6 "Persisted layout" plus the config root
/// `sift-runbook::FsConfigLoader` reads from).
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub data_dir: PathBuf,
    pub config_root: PathBuf,
    pub reset_on_startup: bool,
    pub delete_on_startup: Vec<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self { data_dir: default_state_dir(), config_root: PathBuf::from("."), reset_on_startup: false, delete_on_startup: Vec::new() }
    }
}

impl DaemonConfig {
    /// Load from a TOML file at `path`; a missing file yields
    /// `Self::default()` rather than an error (a fresh install has no
    /// config file yet).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        let raw: RawDaemonConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })?;
        let defaults = Self::default();
        Ok(Self {
            data_dir: raw.data_dir.unwrap_or(defaults.data_dir),
            config_root: raw.config_root.unwrap_or(defaults.config_root),
            reset_on_startup: raw.reset_on_startup,
            delete_on_startup: raw.delete_on_startup,
        })
    }
}
