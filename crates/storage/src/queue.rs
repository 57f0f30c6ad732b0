// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The queue store facade (§4.D): `QueueJob` (immutable) and
//! `JobStatusRecord` (mutable) as two maps keyed by the same `JobId`,
//! plus the child-stats rollups the UI and job manager read.

use crate::kv::StorageManager;
use chrono::{DateTime, Utc};
use sift_core::{ChildStats, Event, JobId, JobStatus, JobStatusRecord, QueueJob};
use std::collections::HashMap;
use std::io;

pub struct QueueStore<'a> {
    manager: &'a StorageManager,
}

impl<'a> QueueStore<'a> {
    pub fn new(manager: &'a StorageManager) -> Self {
        Self { manager }
    }

    /// Write a new `QueueJob`. A no-op when `job.id` already has a
    /// record — `JobEnqueued` is applied once, the first time
    /// (§4.D `save_job` is described as upserting the status record
    /// around the immutable job; the job itself is write-once).
    pub fn save_job(&self, job: QueueJob) -> io::Result<()> {
        self.manager.transact(|_| (Event::JobEnqueued { job }, ()))
    }

    pub fn get_job(&self, id: &JobId) -> Option<QueueJob> {
        self.manager.with_state(|state| state.jobs.get(id).cloned())
    }

    pub fn get_status(&self, id: &JobId) -> Option<JobStatusRecord> {
        self.manager.with_state(|state| state.job_status.get(id).cloned())
    }

    pub fn update_job_status(&self, id: &JobId, status: JobStatus, error: Option<String>, now: DateTime<Utc>) -> io::Result<()> {
        self.manager
            .transact(|_| (Event::JobStatusChanged { id: id.clone(), status, error, occurred_at: now }, ()))
    }

    pub fn update_progress_counters(
        &self,
        id: &JobId,
        completed_delta: i64,
        pending_delta: i64,
        total_delta: i64,
        failed_delta: i64,
        now: DateTime<Utc>,
    ) -> io::Result<()> {
        self.manager.transact(|_| {
            (
                Event::JobProgressUpdated {
                    id: id.clone(),
                    completed_delta,
                    pending_delta,
                    total_delta,
                    failed_delta,
                    occurred_at: now,
                },
                (),
            )
        })
    }

    /// The single authority for `document_count`; returns the new
    /// value (§4.D, §8 distinct-and-monotone property).
    pub fn increment_document_count(&self, id: &JobId, now: DateTime<Utc>) -> io::Result<u64> {
        self.manager.transact(|state| {
            let current = state.job_status.get(id).map(|r| r.document_count).unwrap_or(0);
            (Event::DocumentCountIncremented { id: id.clone(), delta: 1, occurred_at: now }, current + 1)
        })
    }

    pub fn update_heartbeat(&self, id: &JobId, now: DateTime<Utc>) -> io::Result<()> {
        self.manager.transact(|_| (Event::JobHeartbeat { id: id.clone(), occurred_at: now }, ()))
    }

    pub fn get_stale_jobs(&self, threshold: DateTime<Utc>) -> Vec<JobId> {
        self.manager.with_state(|state| {
            state
                .job_status
                .values()
                .filter(|r| r.is_stale(threshold))
                .map(|r| r.id.clone())
                .collect()
        })
    }

    /// Flip every `running` status to `pending`, used at boot to
    /// recover from an ungraceful shutdown (§4.D `mark_running_jobs_as_pending`).
    pub fn mark_running_jobs_as_pending(&self, now: DateTime<Utc>) -> io::Result<usize> {
        let running: Vec<JobId> = self
            .manager
            .with_state(|state| state.job_status.values().filter(|r| r.status == JobStatus::Running).map(|r| r.id.clone()).collect());
        for id in &running {
            self.update_job_status(id, JobStatus::Pending, None, now)?;
        }
        Ok(running.len())
    }

    /// Per `parent_ids`, counts by terminal status over leaf
    /// descendants only — intermediate steps are traversed but not
    /// counted (§4.D, §8 scenario 1).
    pub fn get_job_child_stats(&self, parent_ids: &[JobId]) -> HashMap<JobId, ChildStats> {
        self.manager.with_state(|state| {
            parent_ids
                .iter()
                .map(|parent_id| {
                    let mut stats = ChildStats::default();
                    let mut stack = vec![parent_id.clone()];
                    while let Some(current) = stack.pop() {
                        for child in state.children_of(&current) {
                            if state.children_of(&child.id).is_empty() {
                                if let Some(status) = state.job_status.get(&child.id).map(|r| r.status) {
                                    stats.record(status);
                                }
                            } else {
                                stack.push(child.id.clone());
                            }
                        }
                    }
                    (parent_id.clone(), stats)
                })
                .collect()
        })
    }

    /// Per-step status plus summed leaf counts under `manager_id`
    /// (§4.D `get_step_stats`).
    pub fn get_step_stats(&self, manager_id: &JobId) -> HashMap<JobId, ChildStats> {
        self.manager.with_state(|state| {
            state
                .children_of(manager_id)
                .into_iter()
                .map(|step| {
                    let mut stats = ChildStats::default();
                    for leaf in state.children_of(&step.id) {
                        if let Some(status) = state.job_status.get(&leaf.id).map(|r| r.status) {
                            stats.record(status);
                        }
                    }
                    (step.id.clone(), stats)
                })
                .collect()
        })
    }

    /// Direct children of `parent_id` only, used by the job manager to
    /// walk one level at a time (step list under a manager, leaves
    /// under a step) without the full recursive sweep `descendants` does.
    pub fn direct_children(&self, parent_id: &JobId) -> Vec<QueueJob> {
        self.manager.with_state(|state| state.children_of(parent_id).into_iter().cloned().collect())
    }

    /// Every job of a given `kind`, used by `list_managers` (§4.I).
    pub fn list_by_kind(&self, kind: sift_core::JobKind) -> Vec<QueueJob> {
        self.manager.with_state(|state| state.jobs.values().filter(|j| j.kind == kind).cloned().collect())
    }

    /// Every descendant of `root` (steps and leaves alike), in no
    /// particular order — used by cancellation, which must flip every
    /// non-terminal descendant regardless of hierarchy depth.
    pub fn descendants(&self, root: &JobId) -> Vec<JobId> {
        self.manager.with_state(|state| {
            let mut out = Vec::new();
            let mut stack = vec![root.clone()];
            while let Some(current) = stack.pop() {
                for child in state.children_of(&current) {
                    out.push(child.id.clone());
                    stack.push(child.id.clone());
                }
            }
            out
        })
    }

    /// Delete every `QueueJob` and `JobStatusRecord`, including any
    /// orphaned status record with no matching job. Status records go
    /// first, jobs second, so a reader can never observe a job without
    /// its status (§4.D `ClearAllJobs`).
    pub fn clear_all(&self, now: DateTime<Utc>) -> io::Result<()> {
        self.manager.transact(|_| (Event::JobsCleared { occurred_at: now }, ()))
    }

    /// Insert-on-composite-key dedup: returns whether `url` had not
    /// been seen for `job_id` before this call (§4.D, §8 at-most-once
    /// property).
    pub fn mark_url_seen(&self, job_id: &JobId, url: &str, now: DateTime<Utc>) -> io::Result<bool> {
        let url_hash = format!("{:x}", md5_like_hash(url));
        self.manager.transact(|state| {
            let is_new = !state.seen_urls.get(job_id).map(|set| set.contains(&url_hash)).unwrap_or(false);
            (Event::UrlSeen { job_id: job_id.clone(), url_hash: url_hash.clone(), is_new, occurred_at: now }, is_new)
        })
    }
}

/// A stable, dependency-free 64-bit hash of `url` for the seen-set
/// composite key (collision risk is immaterial here: a false-positive
/// dedup just skips a re-crawl, which a later full sync corrects).
fn md5_like_hash(url: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    url.hash(&mut hasher);
    hasher.finish()
}
