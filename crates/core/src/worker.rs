// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker dispatch contract (§4.H).
//!
//! A `DefinitionWorker` is registered under a `WorkerType` tag and is the
//! sole integration point between a step's declared `worker_type` and the
//! code that actually does the work — collecting documents, transforming
//! them, or computing a rating factor.

use crate::error::CoreError;
use crate::job_definition::{JobDefinition, Step};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

pub type WorkerType = String;

/// Whether a worker's `init` result should fan out into child leaf jobs
/// or be executed inline by the worker itself (§4.H step 2/3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Inline,
    ChildJobs,
}

crate::simple_display! {
    Strategy {
        Inline => "inline",
        ChildJobs => "child_jobs",
    }
}

/// One unit of prospective work discovered by `init`, destined either to
/// be processed inline or materialised as a child leaf job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub key: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl WorkItem {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), metadata: HashMap::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInitResult {
    pub work_items: Vec<WorkItem>,
    pub total_count: u64,
    pub strategy: Strategy,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl WorkerInitResult {
    pub fn inline(work_items: Vec<WorkItem>) -> Self {
        let total_count = work_items.len() as u64;
        Self { work_items, total_count, strategy: Strategy::Inline, metadata: HashMap::new() }
    }

    pub fn child_jobs(work_items: Vec<WorkItem>) -> Self {
        let total_count = work_items.len() as u64;
        Self { work_items, total_count, strategy: Strategy::ChildJobs, metadata: HashMap::new() }
    }
}

/// Execution context handed to every worker call: the step's declared
/// config plus whatever shared handles the worker needs to reach storage,
/// config, and the bus. Kept minimal and cloneable; concrete field wiring
/// lives in `sift-engine`, which constructs it from its own storage/bus
/// handles and passes a reference here to avoid a circular crate
/// dependency.
pub trait WorkerContext: Send + Sync {
    fn job_definition_id(&self) -> &str;
}

#[async_trait]
pub trait DefinitionWorker: Send + Sync {
    fn get_type(&self) -> WorkerType;

    /// Whether `init` always returns `Strategy::ChildJobs` for this
    /// worker type. Pure declaration, independent of any particular
    /// `init` call's result — used by the manager to size step progress
    /// before the first `init` runs.
    fn returns_child_jobs(&self) -> bool;

    fn validate_config(&self, step: &Step) -> Result<(), CoreError>;

    /// `token` is cancelled when the owning manager is cancelled; a
    /// worker that makes a connector call expected to take a while
    /// should race it against `token.cancelled()` and return
    /// `CoreError::cancelled()` rather than run it to completion.
    async fn init(
        &self,
        ctx: &(dyn WorkerContext + '_),
        step: &Step,
        job_def: &JobDefinition,
        token: &CancellationToken,
    ) -> Result<WorkerInitResult, CoreError>;

    /// Perform the step's side effects. For `Strategy::Inline` workers
    /// this is where documents get persisted and events published; for
    /// `Strategy::ChildJobs` workers the framework has already
    /// materialised the child leaf jobs and this is typically a no-op
    /// bookkeeping call. See `init`'s doc comment for `token`.
    async fn create_jobs(
        &self,
        ctx: &(dyn WorkerContext + '_),
        step: &Step,
        job_def: &JobDefinition,
        step_id: &str,
        init_result: &WorkerInitResult,
        token: &CancellationToken,
    ) -> Result<String, CoreError>;
}

/// A registry of `DefinitionWorker`s keyed by `WorkerType`, looked up by
/// the dispatch algorithm's step 1 (§4.H).
#[derive(Default)]
pub struct WorkerRegistry {
    workers: HashMap<WorkerType, std::sync::Arc<dyn DefinitionWorker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, worker: std::sync::Arc<dyn DefinitionWorker>) {
        self.workers.insert(worker.get_type(), worker);
    }

    pub fn get(&self, worker_type: &str) -> Option<std::sync::Arc<dyn DefinitionWorker>> {
        self.workers.get(worker_type).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopWorker;

    #[async_trait]
    impl DefinitionWorker for NoopWorker {
        fn get_type(&self) -> WorkerType {
            "noop".into()
        }

        fn returns_child_jobs(&self) -> bool {
            false
        }

        fn validate_config(&self, _step: &Step) -> Result<(), CoreError> {
            Ok(())
        }

        async fn init(
            &self,
            _ctx: &(dyn WorkerContext + '_),
            _step: &Step,
            _job_def: &JobDefinition,
            _token: &CancellationToken,
        ) -> Result<WorkerInitResult, CoreError> {
            Ok(WorkerInitResult::inline(vec![]))
        }

        async fn create_jobs(
            &self,
            _ctx: &(dyn WorkerContext + '_),
            _step: &Step,
            _job_def: &JobDefinition,
            step_id: &str,
            _init_result: &WorkerInitResult,
            _token: &CancellationToken,
        ) -> Result<String, CoreError> {
            Ok(step_id.to_string())
        }
    }

    #[test]
    fn registry_lookup_returns_registered_worker() {
        let mut registry = WorkerRegistry::new();
        registry.register(std::sync::Arc::new(NoopWorker));
        assert!(registry.get("noop").is_some());
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn init_result_sizes_total_count_from_work_items() {
        let result = WorkerInitResult::child_jobs(vec![WorkItem::new("a"), WorkItem::new("b")]);
        assert_eq!(result.total_count, 2);
        assert_eq!(result.strategy, Strategy::ChildJobs);
    }
}
