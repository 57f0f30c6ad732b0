// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job hierarchy: the immutable `QueueJob` plus the mutable `JobStatusRecord`.
//!
//! Every execution instance is one of `manager` (top-level, `parent_id =
//! None`), `step` (organisational container under a manager), or `leaf`
//! (the unit of work counted in child statistics). See GLOSSARY.

use crate::id::{JobDefinitionId, JobId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Manager,
    Step,
    Leaf,
}

crate::simple_display! {
    JobKind {
        Manager => "manager",
        Step => "step",
        Leaf => "leaf",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

crate::simple_display! {
    JobStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// URL/work-item progress counters, recomputed on every delta (§4.D).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub total_urls: u64,
    pub pending_urls: u64,
    pub completed_urls: u64,
    pub failed_urls: u64,
    pub percentage: f64,
}

impl Progress {
    /// Apply deltas and recompute `percentage = (completed + failed) / total * 100`
    /// when `total > 0` (§4.D `update_progress_counters_atomic`).
    pub fn apply_deltas(&mut self, completed: i64, pending: i64, total: i64, failed: i64) {
        self.completed_urls = apply_delta(self.completed_urls, completed);
        self.pending_urls = apply_delta(self.pending_urls, pending);
        self.total_urls = apply_delta(self.total_urls, total);
        self.failed_urls = apply_delta(self.failed_urls, failed);
        if self.total_urls > 0 {
            self.percentage =
                (self.completed_urls + self.failed_urls) as f64 / self.total_urls as f64 * 100.0;
        }
    }
}

fn apply_delta(current: u64, delta: i64) -> u64 {
    if delta >= 0 {
        current.saturating_add(delta as u64)
    } else {
        current.saturating_sub(delta.unsigned_abs())
    }
}

/// The immutable half of a job: created once by `save_job`/`enqueue`,
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueJob {
    pub id: JobId,
    #[serde(rename = "type")]
    pub kind: JobKind,
    pub parent_id: Option<JobId>,
    pub job_definition_id: Option<JobDefinitionId>,
    pub step_index: Option<usize>,
    pub worker_type: String,
    pub config: serde_json::Value,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl QueueJob {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: JobKind,
        parent_id: Option<JobId>,
        job_definition_id: Option<JobDefinitionId>,
        step_index: Option<usize>,
        worker_type: impl Into<String>,
        config: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: JobId::new(),
            kind,
            parent_id,
            job_definition_id,
            step_index,
            worker_type: worker_type.into(),
            config,
            metadata: HashMap::new(),
            created_at: now,
        }
    }
}

crate::builder! {
    pub struct QueueJobBuilder => QueueJob {
        set {
            kind: JobKind = JobKind::Leaf,
            parent_id: Option<JobId> = None,
            job_definition_id: Option<JobDefinitionId> = None,
            step_index: Option<usize> = None,
            config: serde_json::Value = serde_json::Value::Null,
            metadata: HashMap<String, serde_json::Value> = HashMap::new(),
        }
        into {
            worker_type: String = "noop",
        }
        computed {
            id: JobId = JobId::new(),
            created_at: DateTime<Utc> = Utc::now(),
        }
    }
}

/// The mutable half of a job, updated independently across many code paths
/// (§4.D). `document_count` has a single writer:
/// `increment_document_count_atomic`; every other field here may be
/// written by `update_job_status`/`update_progress_counters_atomic`/
/// `update_job_heartbeat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusRecord {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: Progress,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub result_count: u64,
    pub failed_count: u64,
    pub document_count: u64,
    pub updated_at: DateTime<Utc>,
}

impl JobStatusRecord {
    pub fn new(id: JobId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            progress: Progress::default(),
            started_at: None,
            completed_at: None,
            finished_at: None,
            last_heartbeat: None,
            error: None,
            result_count: 0,
            failed_count: 0,
            document_count: 0,
            updated_at: now,
        }
    }

    /// Apply a status transition per §4.D `update_job_status` semantics:
    /// stamp `started_at` on first entry into `running`, stamp
    /// `completed_at`/`finished_at` on any terminal status, and record the
    /// error message when non-empty.
    pub fn transition(&mut self, status: JobStatus, error: Option<String>, now: DateTime<Utc>) {
        if status == JobStatus::Running && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if status.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(now);
            self.finished_at = Some(now);
        }
        if let Some(err) = error {
            if !err.is_empty() {
                self.error = Some(err);
            }
        }
        self.status = status;
        self.updated_at = now;
    }

    pub fn heartbeat(&mut self, now: DateTime<Utc>) {
        self.last_heartbeat = Some(now);
        self.updated_at = now;
    }

    /// Whether this job's heartbeat (or, absent any heartbeat, its start
    /// time) precedes `threshold`, per §4.D `get_stale_jobs`.
    pub fn is_stale(&self, threshold: DateTime<Utc>) -> bool {
        if self.status != JobStatus::Running {
            return false;
        }
        match self.last_heartbeat {
            Some(hb) => hb < threshold,
            None => self.started_at.map(|s| s < threshold).unwrap_or(false),
        }
    }
}

/// Per-terminal-status counts over a manager's leaf descendants (§4.D
/// `get_job_child_stats`). Intermediate `step` parents are traversed but
/// never counted (§3 hierarchy invariant, §8 testable property).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildStats {
    pub child_count: u64,
    pub completed_children: u64,
    pub running: u64,
    pub pending: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl ChildStats {
    pub fn record(&mut self, status: JobStatus) {
        self.child_count += 1;
        match status {
            JobStatus::Completed => self.completed_children += 1,
            JobStatus::Running => self.running += 1,
            JobStatus::Pending => self.pending += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
        }
    }
}
