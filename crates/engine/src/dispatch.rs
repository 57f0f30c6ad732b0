// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker dispatch framework (§4.H): resolves a leaf job's
//! registered `DefinitionWorker`, runs `init`/`create_jobs` under a
//! heartbeat ticker, and either completes the leaf inline or
//! materialises child leaf jobs for the `ChildJobs` strategy.

use chrono::Utc;
use sift_core::{
    CancellationToken, Clock, CoreError, CoreResult, JobDefinition, JobId, JobKind, JobStatus, QueueJob, Step, Strategy, WorkerContext,
    WorkerInitResult, WorkerRegistry,
};
use sift_storage::{JobDefinitionStore, QueueStore, StorageManager};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Minimal `WorkerContext` implementation the engine hands to every
/// worker call; concrete field wiring lives here rather than in
/// `sift-core` to avoid a circular crate dependency (see the trait's
/// doc comment).
#[derive(Clone)]
pub struct EngineContext {
    job_definition_id: String,
}

impl EngineContext {
    pub fn new(job_definition_id: impl Into<String>) -> Self {
        Self { job_definition_id: job_definition_id.into() }
    }
}

impl WorkerContext for EngineContext {
    fn job_definition_id(&self) -> &str {
        &self.job_definition_id
    }
}

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// What happened when dispatching one leaf: it either finished inline
/// (with a terminal status already recorded) or fanned out into
/// children that must each be dispatched and reconciled separately.
pub enum DispatchOutcome {
    Inline(JobStatus),
    ChildJobs(Vec<JobId>),
}

/// Run the dispatch algorithm for leaf job `leaf_id` (§4.H steps 1-5).
/// `storage` is an `Arc` handle so the heartbeat ticker spawned for the
/// duration of the worker call can outlive this function's stack frame.
/// `token` is the owning manager's cancellation token (§5); it is both
/// passed straight through to the worker and raced against the call
/// here, so a worker that never checks it still gets interrupted at the
/// dispatch boundary.
pub async fn dispatch_leaf(
    registry: &WorkerRegistry,
    storage: Arc<StorageManager>,
    leaf_id: &JobId,
    clock: &(impl Clock + Send + Sync),
    token: &CancellationToken,
) -> CoreResult<DispatchOutcome> {
    let queue = QueueStore::new(&storage);
    let defs = JobDefinitionStore::new(&storage);

    let leaf = queue.get_job(leaf_id).ok_or_else(|| CoreError::NotFound(format!("job {leaf_id}")))?;

    // Step 1: resolve the worker; an absent type fails the job immediately.
    let Some(worker) = registry.get(&leaf.worker_type) else {
        queue
            .update_job_status(leaf_id, JobStatus::Failed, Some(format!("unknown worker type: {}", leaf.worker_type)), clock.now())
            .map_err(storage_err)?;
        return Ok(DispatchOutcome::Inline(JobStatus::Failed));
    };

    let job_def = match &leaf.job_definition_id {
        Some(id) => defs.get(id).unwrap_or_else(|| synthetic_definition(&leaf)),
        None => synthetic_definition(&leaf),
    };
    let step = synthetic_step(&leaf);
    let ctx = EngineContext::new(job_def.id.to_string());

    queue.update_job_status(leaf_id, JobStatus::Running, None, clock.now()).map_err(storage_err)?;

    // Step 4: heartbeat ticker runs for the duration of `init` + `create_jobs`.
    let heartbeat = spawn_heartbeat(storage.clone(), leaf_id.clone());

    let init_result: WorkerInitResult = {
        let worker = worker.clone();
        let ctx = ctx.clone();
        let step = step.clone();
        let job_def = job_def.clone();
        let init_token = token.clone();
        let result = run_worker_call(token, async move { worker.init(&ctx, &step, &job_def, &init_token).await }).await;
        match result {
            Ok(result) => result,
            Err(e) => {
                heartbeat.abort();
                let status = status_for_error(&e);
                queue.update_job_status(leaf_id, status, Some(e.to_string()), clock.now()).map_err(storage_err)?;
                return Ok(DispatchOutcome::Inline(status));
            }
        }
    };

    tracing::info!(job = %leaf_id, worker = %leaf.worker_type, work_items = init_result.work_items.len(), "worker init complete");

    let outcome = match init_result.strategy {
        // Step 2: inline strategy runs the worker's side effects directly.
        Strategy::Inline => {
            let run_result = {
                let worker = worker.clone();
                let ctx = ctx.clone();
                let step = step.clone();
                let job_def = job_def.clone();
                let init_result = init_result.clone();
                let step_id = leaf_id.to_string();
                let run_token = token.clone();
                run_worker_call(token, async move {
                    worker.create_jobs(&ctx, &step, &job_def, &step_id, &init_result, &run_token).await
                })
                .await
            };
            heartbeat.abort();
            match run_result {
                Ok(_) => {
                    queue.update_job_status(leaf_id, JobStatus::Completed, None, clock.now()).map_err(storage_err)?;
                    DispatchOutcome::Inline(JobStatus::Completed)
                }
                Err(e) => {
                    let status = status_for_error(&e);
                    queue.update_job_status(leaf_id, status, Some(e.to_string()), clock.now()).map_err(storage_err)?;
                    DispatchOutcome::Inline(status)
                }
            }
        }
        // Step 3: child-jobs strategy materialises one leaf per work item.
        Strategy::ChildJobs => {
            let mut child_ids = Vec::with_capacity(init_result.work_items.len());
            for item in &init_result.work_items {
                let mut config = leaf.config.clone();
                if let serde_json::Value::Object(ref mut map) = config {
                    map.insert("work_item_key".to_string(), serde_json::Value::String(item.key.clone()));
                    for (k, v) in &item.metadata {
                        map.insert(k.clone(), v.clone());
                    }
                }
                let child = QueueJob::new(
                    JobKind::Leaf,
                    Some(leaf_id.clone()),
                    leaf.job_definition_id.clone(),
                    None,
                    leaf.worker_type.clone(),
                    config,
                    clock.now(),
                );
                queue.save_job(child.clone()).map_err(storage_err)?;
                child_ids.push(child.id.clone());
            }
            queue
                .update_progress_counters(leaf_id, 0, init_result.total_count as i64, init_result.total_count as i64, 0, clock.now())
                .map_err(storage_err)?;
            // `create_jobs` for a child-jobs worker is typically a
            // bookkeeping no-op; the framework already materialised
            // the children above (§4.H step 3).
            let bookkeeping = {
                let worker = worker.clone();
                let ctx = ctx.clone();
                let step = step.clone();
                let job_def = job_def.clone();
                let init_result = init_result.clone();
                let step_id = leaf_id.to_string();
                let run_token = token.clone();
                run_worker_call(token, async move {
                    worker.create_jobs(&ctx, &step, &job_def, &step_id, &init_result, &run_token).await
                })
                .await
            };
            heartbeat.abort();
            if let Err(e) = bookkeeping {
                let status = status_for_error(&e);
                queue.update_job_status(leaf_id, status, Some(e.to_string()), clock.now()).map_err(storage_err)?;
                return Ok(DispatchOutcome::Inline(status));
            }
            queue.update_job_status(leaf_id, JobStatus::Running, None, clock.now()).map_err(storage_err)?;
            DispatchOutcome::ChildJobs(child_ids)
        }
    };

    Ok(outcome)
}

fn status_for_error(e: &CoreError) -> JobStatus {
    if matches!(e, CoreError::Cancelled) {
        JobStatus::Cancelled
    } else {
        JobStatus::Failed
    }
}

/// Run a worker call under panic isolation, mirroring
/// `Scheduler::execute_job`'s `tokio::spawn` + `JoinError::is_panic`
/// idiom so a worker bug can't take the whole process down, and race it
/// against `token` so a cancelled manager doesn't wait on a worker call
/// that ignores cancellation itself.
async fn run_worker_call<F, T>(token: &CancellationToken, fut: F) -> Result<T, CoreError>
where
    F: std::future::Future<Output = Result<T, CoreError>> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::spawn(fut);
    tokio::select! {
        _ = token.cancelled() => {
            handle.abort();
            Err(CoreError::cancelled())
        }
        outcome = handle => match outcome {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => Err(CoreError::Panic(join_err.to_string())),
            Err(_join_err) => Err(CoreError::cancelled()),
        },
    }
}

fn storage_err(e: std::io::Error) -> CoreError {
    CoreError::StorageFailure(e.to_string())
}

fn spawn_heartbeat(storage: Arc<StorageManager>, leaf_id: JobId) -> JoinHandle<()> {
    tokio::spawn(async move {
        let queue = QueueStore::new(&storage);
        loop {
            tokio::time::sleep(HEARTBEAT_INTERVAL).await;
            let _ = queue.update_heartbeat(&leaf_id, Utc::now());
        }
    })
}

fn synthetic_definition(leaf: &QueueJob) -> JobDefinition {
    JobDefinition::new(leaf.worker_type.clone(), vec![synthetic_step(leaf)], leaf.created_at)
}

fn synthetic_step(leaf: &QueueJob) -> Step {
    Step::new(leaf.id.to_string(), leaf.worker_type.clone(), leaf.config.clone())
}
