// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job manager orchestrator (§4.I): enqueues a job definition as a
//! manager/step/leaf tree, advances steps on completion honouring
//! `continue_on_error`, and reconciles in-flight jobs at boot.
//! Structurally this is the counterpart of the teacher's `Runtime`: it
//! holds the storage manager, the bus, and the worker registry.

use crate::dispatch::{dispatch_leaf, DispatchOutcome};
use crate::error::{EngineError, EngineResult};
use sift_core::{
    CancellationToken, ChildStats, Clock, CoreError, JobDefinitionId, JobId, JobKind, JobStatus, JobStatusRecord, QueueJob, SystemClock,
    WorkerRegistry,
};
use sift_storage::{JobDefinitionStore, LogStore, QueueStore, StorageManager};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Options accepted by `list_managers` (§4.I).
#[derive(Debug, Clone, Default)]
pub struct ListManagersOpts {
    pub status: Option<JobStatus>,
    pub limit: Option<usize>,
}

/// A manager job's full tree state, as returned by `get_manager_state`.
pub struct ManagerState {
    pub manager: QueueJob,
    pub status: JobStatusRecord,
    pub steps: Vec<(QueueJob, JobStatusRecord)>,
    pub child_stats: ChildStats,
}

pub struct JobManager<C: Clock = SystemClock> {
    storage: Arc<StorageManager>,
    registry: Arc<WorkerRegistry>,
    clock: C,
    /// One cancellation token per in-flight manager tree, keyed by the
    /// manager job's id (§5). `cancel()` fires the token in addition to
    /// flipping status records; leaves resolve their owning manager's
    /// token by walking `parent_id` up to the `Manager` job.
    tokens: Mutex<HashMap<JobId, CancellationToken>>,
}

impl JobManager<SystemClock> {
    pub fn new(storage: Arc<StorageManager>, registry: Arc<WorkerRegistry>) -> Self {
        Self::with_clock(storage, registry, SystemClock)
    }
}

impl<C: Clock> JobManager<C> {
    pub fn with_clock(storage: Arc<StorageManager>, registry: Arc<WorkerRegistry>, clock: C) -> Self {
        Self { storage, registry, clock, tokens: Mutex::new(HashMap::new()) }
    }

    fn queue(&self) -> QueueStore<'_> {
        QueueStore::new(&self.storage)
    }

    fn defs(&self) -> JobDefinitionStore<'_> {
        JobDefinitionStore::new(&self.storage)
    }

    fn logs(&self) -> LogStore<'_> {
        LogStore::new(&self.storage)
    }

    /// Get or create the cancellation token for manager `manager_id`
    /// (§5). Created eagerly at enqueue time so a `cancel()` call always
    /// has a live token to fire, even before any leaf has dispatched.
    fn token_for_manager(&self, manager_id: &JobId) -> CancellationToken {
        self.tokens.lock().entry(manager_id.clone()).or_insert_with(CancellationToken::new).clone()
    }

    /// Walk `parent_id` up from `leaf_id` to the owning `Manager` job.
    fn find_manager_ancestor(&self, leaf_id: &JobId) -> Option<JobId> {
        let mut current = self.queue().get_job(leaf_id)?;
        loop {
            if current.kind == JobKind::Manager {
                return Some(current.id);
            }
            let parent_id = current.parent_id.clone()?;
            current = self.queue().get_job(&parent_id)?;
        }
    }

    /// The cancellation token to pass into `dispatch_leaf` for
    /// `leaf_id`. A leaf with no manager ancestor (e.g. one dispatched
    /// directly in a test) gets a fresh, never-cancelled token.
    fn token_for_leaf(&self, leaf_id: &JobId) -> CancellationToken {
        match self.find_manager_ancestor(leaf_id) {
            Some(manager_id) => self.token_for_manager(&manager_id),
            None => CancellationToken::new(),
        }
    }

    /// Load the definition, validate every step's worker config, then
    /// create the manager/step tree and the first step's leaf (§4.I
    /// `enqueue`).
    pub fn enqueue_by_definition_id(&self, def_id: &JobDefinitionId, overrides: serde_json::Value) -> EngineResult<JobId> {
        let def = self.defs().get(def_id).ok_or_else(|| EngineError::DefinitionNotFound(def_id.to_string()))?;
        for step in &def.steps {
            let worker = self.registry.get(&step.worker_type).ok_or_else(|| CoreError::UnknownWorker(step.worker_type.clone()))?;
            worker.validate_config(step).map_err(EngineError::Core)?;
        }

        let now = self.clock.now();
        let manager = QueueJob::new(JobKind::Manager, None, Some(def.id.clone()), None, def.job_type.clone(), overrides, now);
        self.queue().save_job(manager.clone()).map_err(EngineError::Storage)?;
        self.logs().append(&manager.id, "info", format!("started: {}", def.name), now).map_err(EngineError::Storage)?;
        self.token_for_manager(&manager.id);

        let mut step_jobs = Vec::with_capacity(def.steps.len());
        for (i, step) in def.steps.iter().enumerate() {
            let step_job = QueueJob::new(
                JobKind::Step,
                Some(manager.id.clone()),
                Some(def.id.clone()),
                Some(i),
                step.worker_type.clone(),
                step.config.clone(),
                now,
            );
            self.queue().save_job(step_job.clone()).map_err(EngineError::Storage)?;
            step_jobs.push(step_job);
        }

        if let Some(first_step) = step_jobs.first() {
            self.spawn_leaf_for_step(first_step)?;
        } else {
            // A definition with no steps completes immediately.
            self.queue().update_job_status(&manager.id, JobStatus::Completed, None, now).map_err(EngineError::Storage)?;
        }

        Ok(manager.id)
    }

    fn spawn_leaf_for_step(&self, step_job: &QueueJob) -> EngineResult<JobId> {
        let now = self.clock.now();
        let leaf = QueueJob::new(
            JobKind::Leaf,
            Some(step_job.id.clone()),
            step_job.job_definition_id.clone(),
            step_job.step_index,
            step_job.worker_type.clone(),
            step_job.config.clone(),
            now,
        );
        self.queue().save_job(leaf.clone()).map_err(EngineError::Storage)?;
        self.queue().update_job_status(&step_job.id, JobStatus::Running, None, now).map_err(EngineError::Storage)?;
        Ok(leaf.id)
    }

    /// Dispatch one leaf job and, if it reached a terminal status,
    /// advance the tree: propagate to its parent step, and if the step
    /// is now terminal, either instantiate the next step's leaf or
    /// finish the manager (§4.I step sequencing).
    pub async fn run_leaf(&self, leaf_id: &JobId) -> EngineResult<()> {
        let token = self.token_for_leaf(leaf_id);
        let outcome = dispatch_leaf(&self.registry, self.storage.clone(), leaf_id, &self.clock, &token).await.map_err(EngineError::Core)?;
        if let DispatchOutcome::Inline(_) = outcome {
            self.reconcile_ancestors(leaf_id)?;
        }
        Ok(())
    }

    /// Walk up from a terminal leaf: does its parent step now have
    /// every leaf terminal? If so transition it and advance the manager.
    /// The parent may itself be a fan-out leaf rather than a step, in
    /// which case this defers to `reconcile_leaf_children`.
    fn reconcile_ancestors(&self, leaf_id: &JobId) -> EngineResult<()> {
        let Some(leaf) = self.queue().get_job(leaf_id) else { return Ok(()) };
        let Some(parent_id) = leaf.parent_id.clone() else { return Ok(()) };
        match self.queue().get_job(&parent_id).map(|j| j.kind) {
            Some(JobKind::Step) => self.reconcile_step(&parent_id),
            Some(JobKind::Leaf) => self.reconcile_leaf_children(&parent_id),
            _ => Ok(()),
        }
    }

    /// Roll a fan-out leaf's own children up to the leaf itself, the
    /// same precedence `reconcile_step` uses for a step's leaves, then
    /// continue the walk up to whatever the leaf's own parent is.
    fn reconcile_leaf_children(&self, leaf_id: &JobId) -> EngineResult<()> {
        let children = self.queue().direct_children(leaf_id);
        if children.is_empty() {
            return Ok(());
        }
        let statuses: Vec<JobStatus> = children.iter().filter_map(|c| self.queue().get_status(&c.id)).map(|r| r.status).collect();
        if statuses.len() < children.len() || !statuses.iter().all(|s| s.is_terminal()) {
            return Ok(());
        }
        let any_cancelled = statuses.iter().any(|s| *s == JobStatus::Cancelled);
        let any_failed = statuses.iter().any(|s| *s == JobStatus::Failed);
        let status = if any_cancelled {
            JobStatus::Cancelled
        } else if any_failed {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };
        self.queue().update_job_status(leaf_id, status, None, self.clock.now()).map_err(EngineError::Storage)?;
        self.reconcile_ancestors(leaf_id)
    }

    /// Dispatch `leaf_id` and, for the `ChildJobs` strategy, recursively
    /// drive every fanned-out child leaf to a terminal state before
    /// reconciling back up — the full-run counterpart of `run_leaf`,
    /// which only advances one leaf and leaves a fan-out's children
    /// for the caller to dispatch itself.
    pub fn drive_leaf<'a>(&'a self, leaf_id: &'a JobId) -> std::pin::Pin<Box<dyn std::future::Future<Output = EngineResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let token = self.token_for_leaf(leaf_id);
            let outcome = dispatch_leaf(&self.registry, self.storage.clone(), leaf_id, &self.clock, &token).await.map_err(EngineError::Core)?;
            match outcome {
                DispatchOutcome::Inline(_) => self.reconcile_ancestors(leaf_id),
                DispatchOutcome::ChildJobs(children) => {
                    for child_id in &children {
                        self.drive_leaf(child_id).await?;
                    }
                    self.reconcile_leaf_children(leaf_id)
                }
            }
        })
    }

    /// Drive an already-enqueued manager's in-flight step to
    /// completion, picking up wherever it currently stands (§4.I/§4.G
    /// composition: the scheduler and `run-once-trigger` want "run this
    /// to a terminal state", not "dispatch one leaf").
    pub async fn run_manager(&self, manager_id: &JobId) -> EngineResult<()> {
        loop {
            let Some(status) = self.queue().get_status(manager_id) else { return Ok(()) };
            if status.status.is_terminal() {
                return Ok(());
            }
            let steps = self.steps_of_manager(manager_id);
            let Some(step) = steps.iter().find(|s| !self.queue().get_status(&s.id).map(|r| r.status.is_terminal()).unwrap_or(true)) else {
                return Ok(());
            };
            let leaves = self.queue().direct_children(&step.id);
            let Some(leaf) = leaves.iter().find(|l| !self.queue().get_status(&l.id).map(|r| r.status.is_terminal()).unwrap_or(true)) else {
                return Ok(());
            };
            self.drive_leaf(&leaf.id).await?;
        }
    }

    /// Enqueue `def_id` and drive it to a terminal state in one call
    /// (§4.I, the scheduler's and `run-once-trigger`'s entry point).
    pub async fn enqueue_and_run(&self, def_id: &JobDefinitionId, overrides: serde_json::Value) -> EngineResult<JobId> {
        let manager_id = self.enqueue_by_definition_id(def_id, overrides)?;
        self.run_manager(&manager_id).await?;
        Ok(manager_id)
    }

    fn reconcile_step(&self, step_id: &JobId) -> EngineResult<()> {
        let Some(step_node) = self.queue().get_job(step_id) else { return Ok(()) };
        if step_node.kind != JobKind::Step {
            return Ok(());
        }
        let leaves = self.queue().direct_children(step_id);
        if leaves.is_empty() {
            return Ok(());
        }
        let statuses: Vec<JobStatus> = leaves.iter().filter_map(|leaf| self.queue().get_status(&leaf.id)).map(|r| r.status).collect();
        if statuses.len() < leaves.len() || !statuses.iter().all(|s| s.is_terminal()) {
            return Ok(());
        }

        let any_cancelled = statuses.iter().any(|s| *s == JobStatus::Cancelled);
        let any_failed = statuses.iter().any(|s| *s == JobStatus::Failed);
        let now = self.clock.now();
        let next_status = if any_cancelled {
            JobStatus::Cancelled
        } else if any_failed {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };
        self.queue().update_job_status(step_id, next_status, None, now).map_err(EngineError::Storage)?;

        let Some(manager_id) = step_node.parent_id.clone() else { return Ok(()) };

        if next_status == JobStatus::Cancelled {
            return self.finish_manager(&manager_id, JobStatus::Cancelled);
        }

        let def = step_node.job_definition_id.as_ref().and_then(|id| self.defs().get(id));
        let continue_on_error = def.as_ref().map(|d| d.continue_on_error).unwrap_or(false);
        if next_status == JobStatus::Failed && !continue_on_error {
            return self.finish_manager(&manager_id, JobStatus::Failed);
        }

        let step_index = step_node.step_index.unwrap_or(0);
        let steps = self.steps_of_manager(&manager_id);
        match steps.get(step_index + 1) {
            Some(next_step) => {
                self.spawn_leaf_for_step(next_step)?;
            }
            None => {
                let final_status = if self.any_step_failed(&manager_id) { JobStatus::Failed } else { JobStatus::Completed };
                self.finish_manager(&manager_id, final_status)?;
            }
        }
        Ok(())
    }

    fn finish_manager(&self, manager_id: &JobId, status: JobStatus) -> EngineResult<()> {
        self.queue().update_job_status(manager_id, status, None, self.clock.now()).map_err(EngineError::Storage)?;
        self.tokens.lock().remove(manager_id);
        Ok(())
    }

    fn steps_of_manager(&self, manager_id: &JobId) -> Vec<QueueJob> {
        let mut steps = self.queue().direct_children(manager_id);
        steps.sort_by_key(|s| s.step_index.unwrap_or(0));
        steps
    }

    fn any_step_failed(&self, manager_id: &JobId) -> bool {
        self.steps_of_manager(manager_id)
            .iter()
            .any(|s| matches!(self.queue().get_status(&s.id).map(|r| r.status), Some(JobStatus::Failed)))
    }

    /// Mark the manager and every non-terminal descendant cancelled
    /// (§4.I cancellation semantics). Workers observe cancellation via
    /// the token passed at dispatch time and stop at the next
    /// suspension point; firing the token here is what actually
    /// interrupts a leaf currently running inside `dispatch_leaf`.
    pub fn cancel(&self, manager_id: &JobId) -> EngineResult<()> {
        let now = self.clock.now();
        self.token_for_manager(manager_id).cancel();
        self.queue().update_job_status(manager_id, JobStatus::Cancelled, None, now).map_err(EngineError::Storage)?;
        for id in self.queue().descendants(manager_id) {
            if let Some(record) = self.queue().get_status(&id) {
                if !record.status.is_terminal() {
                    self.queue().update_job_status(&id, JobStatus::Cancelled, None, now).map_err(EngineError::Storage)?;
                }
            }
        }
        Ok(())
    }

    /// Every manager job and its status, optionally filtered (§4.I
    /// `list_managers`).
    pub fn list_managers(&self, opts: &ListManagersOpts) -> Vec<(QueueJob, JobStatusRecord)> {
        let mut out: Vec<(QueueJob, JobStatusRecord)> = self
            .queue()
            .list_by_kind(JobKind::Manager)
            .into_iter()
            .filter_map(|job| self.queue().get_status(&job.id).map(|status| (job, status)))
            .filter(|(_, status)| opts.status.map(|s| s == status.status).unwrap_or(true))
            .collect();
        out.sort_by_key(|(job, _)| job.created_at);
        if let Some(limit) = opts.limit {
            out.truncate(limit);
        }
        out
    }

    /// Full tree state for one manager (§4.I `get_manager_state`).
    pub fn get_manager_state(&self, manager_id: &JobId) -> Option<ManagerState> {
        let manager = self.queue().get_job(manager_id)?;
        let status = self.queue().get_status(manager_id)?;
        let steps = self
            .steps_of_manager(manager_id)
            .into_iter()
            .filter_map(|step| {
                let step_status = self.queue().get_status(&step.id)?;
                Some((step, step_status))
            })
            .collect();
        let child_stats = self.queue().get_job_child_stats(&[manager_id.clone()]).remove(manager_id).unwrap_or_default();
        Some(ManagerState { manager, status, steps, child_stats })
    }

    /// Recover from an ungraceful shutdown: flip every `running`
    /// status to `pending` (§4.I `reconcile_on_boot`).
    pub fn reconcile_on_boot(&self) -> EngineResult<usize> {
        self.queue().mark_running_jobs_as_pending(self.clock.now()).map_err(EngineError::Storage)
    }
}
