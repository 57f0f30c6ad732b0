// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios exercising the job execution core through its
//! public crate boundaries: storage, the worker dispatch contract, the
//! job manager, the scheduler, and the rating pipeline glue, wired the
//! way `siftd` wires them at boot rather than through any one crate's
//! own unit tests.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use sift_core::{
    Bus, BusError, CancellationToken, CoreError, DefinitionWorker, Document, DocumentId, Event, FakeClock, Handler, JobDefinition, JobId, JobStatus,
    Step, WorkItem, WorkerContext, WorkerInitResult, WorkerRegistry, WorkerType,
};
use sift_engine::dispatch::EngineContext;
use sift_engine::rating::{component_workers, CompositeRatingWorker, NeutralRatingFn, RatingFn};
use sift_engine::JobManager;
use sift_storage::{DocumentStore, JobDefinitionStore, MaterializedState, QueueStore, StorageManager, Wal};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn storage() -> (Arc<StorageManager>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let wal = Wal::open(dir.path().join("wal.jsonl"), 0).unwrap();
    (Arc::new(StorageManager::new(wal, MaterializedState::new())), dir)
}

/// A trivial one-step inline worker that writes exactly one document per
/// work item, used by scenario 1.
struct DocumentWritingWorker {
    storage: Arc<StorageManager>,
}

#[async_trait]
impl DefinitionWorker for DocumentWritingWorker {
    fn get_type(&self) -> WorkerType {
        "demo_writer".into()
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
        Ok(WorkerInitResult::inline(vec![WorkItem::new("only")]))
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
        let docs = DocumentStore::new(&self.storage);
        let now = Utc::now();
        docs.save(Document::new(DocumentId::new(), "demo", "only", "demo document", "body", now), now)
            .map_err(|e| CoreError::StorageFailure(e.to_string()))?;
        Ok(step_id.to_string())
    }
}

#[tokio::test]
async fn define_enqueue_run_terminal() {
    let (storage, _dir) = storage();
    let clock = FakeClock::new();

    let mut registry = WorkerRegistry::new();
    registry.register(Arc::new(DocumentWritingWorker { storage: storage.clone() }));
    let def = JobDefinition::new("demo", vec![Step::new("s1", "demo_writer", serde_json::json!({}))], clock.now());
    JobDefinitionStore::new(&storage).save(def.clone()).unwrap();

    let docs = DocumentStore::new(&storage);
    let before = docs.count();

    let jm = JobManager::with_clock(storage.clone(), Arc::new(registry), clock);
    let manager_id = jm.enqueue_and_run(&def.id, serde_json::Value::Null).await.unwrap();

    let queue = QueueStore::new(&storage);
    let step = queue.direct_children(&manager_id).into_iter().next().unwrap();
    assert_eq!(step.parent_id.as_ref(), Some(&manager_id));
    let leaf = queue.direct_children(&step.id).into_iter().next().unwrap();
    assert_eq!(leaf.parent_id.as_ref(), Some(&step.id));
    assert_eq!(queue.get_status(&leaf.id).unwrap().status, JobStatus::Completed);

    let stats = queue.get_job_child_stats(&[manager_id.clone()]);
    let stats = stats.get(&manager_id).copied().unwrap();
    assert_eq!(stats.child_count, 1);
    assert_eq!(stats.completed_children, 1);
    assert_eq!(stats.running, 0);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.cancelled, 0);

    assert_eq!(docs.count(), before + 1);
}

/// Stand-in for a real Jira connector: a fixed mapping from job id to the
/// collection results a transform step would otherwise pull from an
/// external source.
struct FakeCollectionResults {
    by_job: HashMap<String, Vec<(String, String, String)>>,
}

/// Subscribes to `collection_triggered` and, on receipt, extracts
/// documents from the collection results for that job and writes them
/// (§8 scenario 2).
struct TransformWorker {
    storage: Arc<StorageManager>,
    results: FakeCollectionResults,
}

#[async_trait]
impl Handler for TransformWorker {
    fn name(&self) -> &str {
        "transform_worker"
    }

    async fn handle(&self, event: &Event) -> Result<(), BusError> {
        let Event::CollectionTriggered { job_id, source_type, .. } = event else {
            return Ok(());
        };
        let Some(rows) = self.results.by_job.get(job_id.to_string().as_str()) else {
            return Ok(());
        };
        let docs = DocumentStore::new(&self.storage);
        let now = Utc::now();
        for (source_id, title, content) in rows {
            let mut doc = Document::new(DocumentId::new(), source_type.clone(), source_id.clone(), title.clone(), content.clone(), now);
            doc.add_tag("transformed");
            docs.save(doc, now).map_err(|e| BusError::HandlerFailed { event_type: event.name().to_string(), message: e.to_string() })?;
        }
        Ok(())
    }
}

#[tokio::test]
async fn collection_triggers_transform_and_writes_documents() {
    let (storage, _dir) = storage();
    let bus = Bus::new();

    let job_id = JobId::new();
    let mut by_job = HashMap::new();
    by_job.insert(job_id.to_string(), vec![("ISSUE-1".to_string(), "Ticket one".to_string(), "# details".to_string())]);

    bus.subscribe("collection_triggered", Arc::new(TransformWorker { storage: storage.clone(), results: FakeCollectionResults { by_job } }));

    bus.publish_sync(&Event::CollectionTriggered { job_id: job_id.clone(), source_id: "j1".into(), source_type: "jira".into(), occurred_at: Utc::now() })
        .await
        .unwrap();

    let docs = DocumentStore::new(&storage);
    let saved = docs.get_by_source("jira", "ISSUE-1").expect("transform worker should have written the extracted document");
    assert_eq!(saved.title, "Ticket one");
    assert_eq!(saved.content_markdown, "# details");
    assert!(saved.tags.contains(&"transformed".to_string()));
}

#[tokio::test]
async fn case_match_search_is_case_sensitive() {
    let (storage, _dir) = storage();
    let docs = DocumentStore::new(&storage);
    let now = Utc::now();

    docs.save(Document::new(DocumentId::new(), "web", "d1", "CAT Protocol", String::new(), now), now).unwrap();
    docs.save(Document::new(DocumentId::new(), "web", "d2", "cat on mat", String::new(), now), now).unwrap();

    let results = docs.full_text_search("case:match CAT", 10);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "CAT Protocol");
}

struct StaleWorker {
    storage: Arc<StorageManager>,
}

#[async_trait]
impl DefinitionWorker for StaleWorker {
    fn get_type(&self) -> WorkerType {
        "stale_demo".into()
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
        Ok(WorkerInitResult::inline(vec![WorkItem::new("only")]))
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
        let docs = DocumentStore::new(&self.storage);
        let now = Utc::now();
        docs.save(Document::new(DocumentId::new(), "stale", "only", "recovered", String::new(), now), now)
            .map_err(|e| CoreError::StorageFailure(e.to_string()))?;
        Ok(step_id.to_string())
    }
}

#[tokio::test]
async fn stale_running_leaf_is_recovered_and_completes() {
    let (storage, _dir) = storage();
    let clock = FakeClock::new();

    let mut registry = WorkerRegistry::new();
    registry.register(Arc::new(StaleWorker { storage: storage.clone() }));
    let def = JobDefinition::new("stale-demo", vec![Step::new("s1", "stale_demo", serde_json::json!({}))], clock.now());
    JobDefinitionStore::new(&storage).save(def.clone()).unwrap();

    let jm = JobManager::with_clock(storage.clone(), Arc::new(registry), clock.clone());
    let manager_id = jm.enqueue_by_definition_id(&def.id, serde_json::Value::Null).unwrap();

    let queue = QueueStore::new(&storage);
    let step = queue.direct_children(&manager_id).into_iter().next().unwrap();
    let leaf = queue.direct_children(&step.id).into_iter().next().unwrap();

    // Simulate a crash mid-dispatch: the leaf was marked running and
    // heartbeated ten minutes ago, then the process died before it ever
    // reached a terminal status.
    let started = clock.now() - ChronoDuration::minutes(10);
    queue.update_job_status(&leaf.id, JobStatus::Running, None, started).unwrap();
    queue.update_heartbeat(&leaf.id, started).unwrap();

    let threshold = clock.now() - ChronoDuration::minutes(5);
    let stale = queue.get_stale_jobs(threshold);
    assert!(stale.contains(&leaf.id));

    let recovered = queue.mark_running_jobs_as_pending(clock.now()).unwrap();
    assert!(recovered >= 1);
    assert_eq!(queue.get_status(&leaf.id).unwrap().status, JobStatus::Pending);

    jm.drive_leaf(&leaf.id).await.unwrap();
    assert_eq!(queue.get_status(&leaf.id).unwrap().status, JobStatus::Completed);
    assert_eq!(queue.get_status(&manager_id).unwrap().status, JobStatus::Completed);
}

#[tokio::test]
async fn concurrent_scheduled_handlers_never_overlap() {
    use sift_engine::Scheduler;

    let scheduler = Arc::new(Scheduler::new(Arc::new(Bus::new())));
    let intervals: Arc<Mutex<Vec<(Instant, Instant)>>> = Arc::new(Mutex::new(Vec::new()));

    for name in ["h1", "h2"] {
        let intervals = intervals.clone();
        scheduler
            .register_job(
                name,
                "* * * * * *",
                Arc::new(move || {
                    let intervals = intervals.clone();
                    Box::pin(async move {
                        let start = Instant::now();
                        tokio::time::sleep(Duration::from_millis(150)).await;
                        intervals.lock().unwrap().push((start, Instant::now()));
                        Ok(())
                    })
                }),
            )
            .unwrap();
    }

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(2_200)).await;

    let recorded = intervals.lock().unwrap().clone();
    assert!(recorded.len() >= 2, "expected both handlers to have run at least once, got {}", recorded.len());
    for i in 0..recorded.len() {
        for j in (i + 1)..recorded.len() {
            let (s1, e1) = recorded[i];
            let (s2, e2) = recorded[j];
            let overlaps = s1 < e2 && s2 < e1;
            assert!(!overlaps, "two scheduled handlers ran concurrently: {:?} and {:?}", recorded[i], recorded[j]);
        }
    }
}

fn worker_ctx() -> EngineContext {
    EngineContext::new("composite-demo")
}

fn write_component(storage: &Arc<StorageManager>, kind: &str, ticker: &str, score: f64) {
    let docs = DocumentStore::new(storage);
    let now = Utc::now();
    let source_type = format!("rating_{kind}");
    let mut doc = Document::new(DocumentId::new(), source_type, ticker.to_lowercase(), format!("{kind} rating"), String::new(), now);
    doc.metadata.insert("score".to_string(), serde_json::json!(score));
    docs.save(doc, now).unwrap();
}

#[tokio::test]
async fn rating_composite_fails_soft_on_missing_component() {
    let (storage, _dir) = storage();
    let rating_fn: Arc<dyn RatingFn> = Arc::new(NeutralRatingFn);
    let composite = CompositeRatingWorker::new(rating_fn, storage.clone());

    for kind in ["bfs", "cds", "nfr", "pps", "vrs", "ob"] {
        write_component(&storage, kind, "T", 1.0);
    }

    let step = Step::new("rate", "rating_composite", serde_json::json!({"tickers": ["T"]}));
    let job_def = JobDefinition::new("rating-demo", vec![step.clone()], Utc::now());
    let ctx = worker_ctx();
    let token = CancellationToken::new();
    let init_result = composite.init(&ctx, &step, &job_def, &token).await.unwrap();
    composite.create_jobs(&ctx, &step, &job_def, "step-1", &init_result, &token).await.unwrap();

    let docs = DocumentStore::new(&storage);
    let result = docs.get_by_source("rating_composite", "t").unwrap();
    assert_eq!(result.metadata.get("label").unwrap(), "investable");
    assert_eq!(result.metadata.get("gate_passed").unwrap(), &serde_json::json!(true));

    // Remove PPS and rerun: the composite must still produce a document,
    // falling back to the neutral default for the missing component.
    let pps = docs.get_by_source("rating_pps", "t").unwrap();
    docs.delete(&pps.id, Utc::now()).unwrap();

    let init_result = composite.init(&ctx, &step, &job_def, &token).await.unwrap();
    composite.create_jobs(&ctx, &step, &job_def, "step-1", &init_result, &token).await.unwrap();

    let result = docs.get_by_source("rating_composite", "t").unwrap();
    let investability = result.metadata.get("investability").unwrap().as_f64().unwrap();
    let expected = (0.5 + 1.0 + 1.0) / 3.0;
    assert!((investability - expected).abs() < 1e-9);
}

#[tokio::test]
async fn component_workers_cover_all_six_kinds() {
    let (storage, _dir) = storage();
    let rating_fn: Arc<dyn RatingFn> = Arc::new(NeutralRatingFn);
    let workers = component_workers(rating_fn, storage);
    let types: Vec<String> = workers.iter().map(|w| w.get_type()).collect();
    for kind in ["bfs", "cds", "nfr", "pps", "vrs", "ob"] {
        assert!(types.contains(&format!("rating_{kind}")), "missing rating_{kind} in {:?}", types);
    }
}
