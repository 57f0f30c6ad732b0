// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job definitions: the reusable, named templates that `enqueue_by_definition_id`
//! instantiates into a manager job plus its step/leaf children.

use crate::id::JobDefinitionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry in a job definition's step list.
///
/// `worker_type` names the registered [`crate::worker::DefinitionWorker`]
/// that executes this step; `config` is opaque to the manager and passed
/// through verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub worker_type: String,
    #[serde(default)]
    pub config: serde_json::Value,
    /// Tags this step's worker reads from upstream documents before
    /// running; used by the manager to decide when a step's dependencies
    /// are satisfied.
    #[serde(default)]
    pub input_tags: Vec<String>,
    /// Tags attached to every document this step's worker writes.
    #[serde(default)]
    pub output_tags: Vec<String>,
    /// Step index is not stored here; it is the position of this entry
    /// within `JobDefinition::steps`.
    #[serde(default)]
    pub description: String,
}

impl Step {
    pub fn new(name: impl Into<String>, worker_type: impl Into<String>, config: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            worker_type: worker_type.into(),
            config,
            input_tags: Vec::new(),
            output_tags: Vec::new(),
            description: String::new(),
        }
    }
}

/// A named, reusable template for a multi-step job (§3, §4.H/I).
///
/// `enqueue_by_definition_id` creates one manager job plus one step job
/// per entry in `steps`, in order; each step's leaves are produced by its
/// worker at dispatch time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefinition {
    pub id: JobDefinitionId,
    pub name: String,
    /// Free-form classification, e.g. `ingest`, `rating`; not interpreted
    /// by the manager, only surfaced to front-ends.
    #[serde(default)]
    pub job_type: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<Step>,
    /// If any step fails, continue to the next step instead of
    /// short-circuiting the manager to `failed` (§4.I).
    #[serde(default)]
    pub continue_on_error: bool,
    /// Optional cron expression; non-empty iff this definition is also
    /// registered with the scheduler (§4.G).
    #[serde(default)]
    pub schedule: Option<String>,
    /// The raw TOML this definition was loaded from, unknown keys and
    /// all (§6): front-ends reflect it verbatim, including fields this
    /// crate doesn't interpret. Empty for definitions built in-process
    /// (e.g. in tests) rather than loaded from a file.
    #[serde(default)]
    pub toml_raw: String,
    /// Structural validation problem found while loading (e.g. a
    /// duplicate step name), recorded rather than rejected — the
    /// definition is still saved and a front-end shows this as a
    /// warning banner (§6).
    #[serde(default)]
    pub validation_warning: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl JobDefinition {
    pub fn new(name: impl Into<String>, steps: Vec<Step>, now: DateTime<Utc>) -> Self {
        Self {
            id: JobDefinitionId::new(),
            name: name.into(),
            job_type: String::new(),
            enabled: true,
            description: String::new(),
            steps,
            continue_on_error: false,
            schedule: None,
            toml_raw: String::new(),
            validation_warning: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn step_at(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }
}
