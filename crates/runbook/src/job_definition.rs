// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job definition TOML loading (§6): an outer table per job (id, name,
//! type, enabled) and an array of step tables.

use crate::error::RunbookError;
use serde::Deserialize;
use sift_core::{JobDefinition, Step};
use std::collections::HashSet;
use std::path::Path;

#[derive(Deserialize)]
struct RawStep {
    name: String,
    worker_type: String,
    #[serde(default)]
    config: serde_json::Value,
    #[serde(default)]
    input_tags: Vec<String>,
    #[serde(default)]
    output_tags: Vec<String>,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct RawDefinition {
    name: String,
    #[serde(default, rename = "type")]
    job_type: String,
    #[serde(default = "raw_default_true")]
    enabled: bool,
    #[serde(default)]
    description: String,
    #[serde(default)]
    continue_on_error: bool,
    #[serde(default)]
    schedule: Option<String>,
    #[serde(default)]
    steps: Vec<RawStep>,
}

fn raw_default_true() -> bool {
    true
}

/// Parse one job definition TOML document.
///
/// Unknown keys are preserved verbatim in `toml_raw` (§6); a structural
/// problem such as a duplicate step name is recorded in
/// `validation_warning` rather than rejecting the load — only malformed
/// TOML syntax itself is a hard error.
pub fn parse(content: &str, path: &str, now: chrono::DateTime<chrono::Utc>) -> Result<JobDefinition, RunbookError> {
    let raw: RawDefinition =
        toml::from_str(content).map_err(|source| RunbookError::Toml { path: path.to_string(), source })?;

    let mut seen = HashSet::new();
    let mut validation_warning = None;
    for step in &raw.steps {
        if !seen.insert(step.name.clone()) {
            validation_warning = Some(format!("duplicate step name '{}'", step.name));
        }
    }
    if raw.name.trim().is_empty() {
        validation_warning = Some("job definition has an empty name".to_string());
    }

    let steps = raw
        .steps
        .into_iter()
        .map(|s| Step {
            name: s.name,
            worker_type: s.worker_type,
            config: s.config,
            input_tags: s.input_tags,
            output_tags: s.output_tags,
            description: s.description,
        })
        .collect();

    let mut def = JobDefinition::new(raw.name, steps, now);
    def.job_type = raw.job_type;
    def.enabled = raw.enabled;
    def.description = raw.description;
    def.continue_on_error = raw.continue_on_error;
    def.schedule = raw.schedule;
    def.toml_raw = content.to_string();
    def.validation_warning = validation_warning;
    Ok(def)
}

/// Read and parse a job definition file from disk.
pub fn load(path: &Path, now: chrono::DateTime<chrono::Utc>) -> Result<JobDefinition, RunbookError> {
    let content = std::fs::read_to_string(path)
        .map_err(|source| RunbookError::Io { path: path.display().to_string(), source })?;
    parse(&content, &path.display().to_string(), now)
}

/// Recursively load every `.toml` job definition under `dir`, skipping
/// and logging (rather than failing on) files that don't parse —
/// mirroring how the rest of the stack tolerates a single bad file in a
/// directory scan.
pub fn load_dir(dir: &Path, now: chrono::DateTime<chrono::Utc>) -> Vec<JobDefinition> {
    let mut defs = Vec::new();
    if !dir.exists() {
        return defs;
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
            match load(&path, now) {
                Ok(def) => defs.push(def),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping invalid job definition"),
            }
        }
    }
    defs.sort_by(|a, b| a.name.cmp(&b.name));
    defs
}
