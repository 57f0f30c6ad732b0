// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The rating pipeline glue (§4.J): seven inline `DefinitionWorker`
//! impls, each reading its tickers from step config, pulling upstream
//! artifact documents, calling an externally-supplied pure rating
//! function, and writing a tagged result document. Only the composite
//! worker depends on the other six and fails soft rather than erroring
//! when one is missing.

use async_trait::async_trait;
use chrono::Utc;
use sift_core::{
    CancellationToken, Clock, CoreError, Document, DocumentId, JobDefinition, JobId, Step, SystemClock, WorkItem, WorkerContext,
    WorkerInitResult, WorkerType,
};
use sift_storage::{DocumentStore, QueueStore, StorageManager};
use std::sync::Arc;

fn storage_err(e: std::io::Error) -> CoreError {
    CoreError::StorageFailure(e.to_string())
}

/// One entry in a rating step's ticker list, e.g. `"AAPL"`. Case is
/// preserved for display but `source_id` always lowercases, matching
/// how tags are written (§4.J: tags include `<lowercased-ticker>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ticker(pub String);

impl Ticker {
    /// The `source_id` a rating worker of kind `kind` reads and writes
    /// under, e.g. ticker `AAPL` + kind `bfs` -> `"aapl"`. All rating
    /// source types share one `source_id` per ticker; `source_type`
    /// (`rating_bfs`, `rating_cds`, …) is what distinguishes the score.
    pub fn source_id(&self, _kind: &str) -> String {
        self.0.to_lowercase()
    }

    fn lowercased(&self) -> String {
        self.0.to_lowercase()
    }
}

/// Extract the ticker list a rating step runs over, from either the
/// step's own config (`{"tickers": [...]}`) or a job-level `tickers`
/// array passed through the manager's enqueue overrides. An absent or
/// malformed list yields no tickers rather than an error: a rating step
/// with nothing to rate trivially succeeds (§4.J leaves the empty case
/// to callers; the inline worker has nothing to do).
fn extract_tickers(step: &Step, job_def: &JobDefinition) -> Vec<Ticker> {
    let from_step = step.config.get("tickers");
    let from_job = job_def.steps.first().and_then(|s| s.config.get("tickers"));
    let raw = from_step.or(from_job);
    raw.and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).map(|s| Ticker(s.to_string())).collect())
        .unwrap_or_default()
}

/// A pure scoring function supplied by the (out-of-scope) rating
/// arithmetic: given whatever inputs a kind needs, produce a score in
/// `[0, 1]` plus free-form metadata to attach to the result document.
pub trait RatingFn: Send + Sync {
    fn score(&self, ticker: &Ticker, inputs: &RatingInputs) -> RatingScore;
}

/// Upstream artifact documents a rating kind reads, keyed by the
/// `source_type` it asked for. Workers populate this from
/// `DocumentStore::get_by_source` calls before invoking the pure
/// function; a missing entry means that source had no document.
#[derive(Debug, Default, Clone)]
pub struct RatingInputs {
    pub components: std::collections::BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct RatingScore {
    pub value: f64,
    pub metadata: std::collections::BTreeMap<String, serde_json::Value>,
}

const NEUTRAL_RATIO_DEFAULT: f64 = 0.5;

/// The default `RatingFn`: every ticker scores at the neutral ratio
/// with no extra metadata. Real deployments supply their own scoring
/// arithmetic and register component/composite workers built from it
/// instead; this exists so the daemon has something concrete to wire
/// up at boot without a rating arithmetic crate of its own.
pub struct NeutralRatingFn;

impl RatingFn for NeutralRatingFn {
    fn score(&self, _ticker: &Ticker, _inputs: &RatingInputs) -> RatingScore {
        RatingScore { value: NEUTRAL_RATIO_DEFAULT, metadata: Default::default() }
    }
}

/// One component rating worker: `bfs`, `cds`, `nfr`, `pps`, `vrs`, or
/// `ob`. Each reads one upstream document type (its own prior run, or
/// a raw fundamentals/market-data artifact named by `upstream_source`),
/// scores it, and writes a `rating_<kind>` document.
pub struct ComponentRatingWorker<C: Clock = SystemClock> {
    kind: &'static str,
    upstream_source: &'static str,
    rating_fn: Arc<dyn RatingFn>,
    storage: Arc<StorageManager>,
    clock: C,
}

impl ComponentRatingWorker<SystemClock> {
    pub fn new(kind: &'static str, upstream_source: &'static str, rating_fn: Arc<dyn RatingFn>, storage: Arc<StorageManager>) -> Self {
        Self { kind, upstream_source, rating_fn, storage, clock: SystemClock }
    }
}

impl<C: Clock> ComponentRatingWorker<C> {
    fn docs(&self) -> DocumentStore<'_> {
        DocumentStore::new(&self.storage)
    }

    fn queue(&self) -> QueueStore<'_> {
        QueueStore::new(&self.storage)
    }

    fn write_result(&self, ticker: &Ticker, step: &Step, score: RatingScore) -> Result<(), CoreError> {
        let source_type = format!("rating_{}", self.kind);
        let now = self.clock.now();
        let existing = self.docs().get_by_source(&source_type, &ticker.source_id(self.kind));
        let id = existing.as_ref().map(|d| d.id.clone()).unwrap_or_else(DocumentId::new);
        let mut doc = Document::new(id, source_type, ticker.source_id(self.kind), format!("{} rating: {}", self.kind, ticker.0), String::new(), now);
        doc.metadata.insert("score".to_string(), serde_json::json!(score.value));
        for (k, v) in score.metadata {
            doc.metadata.insert(k, v);
        }
        doc.add_tag(format!("rating-{}", self.kind));
        doc.add_tag(ticker.lowercased());
        for tag in &step.output_tags {
            doc.add_tag(tag.clone());
        }
        self.docs().save(doc, now)?;
        Ok(())
    }
}

#[async_trait]
impl<C: Clock + Send + Sync> sift_core::DefinitionWorker for ComponentRatingWorker<C> {
    fn get_type(&self) -> WorkerType {
        format!("rating_{}", self.kind)
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
        step: &Step,
        job_def: &JobDefinition,
        _token: &CancellationToken,
    ) -> Result<WorkerInitResult, CoreError> {
        let tickers = extract_tickers(step, job_def);
        Ok(WorkerInitResult::inline(tickers.into_iter().map(|t| WorkItem::new(t.0)).collect()))
    }

    async fn create_jobs(
        &self,
        _ctx: &(dyn WorkerContext + '_),
        step: &Step,
        _job_def: &JobDefinition,
        step_id: &str,
        init_result: &WorkerInitResult,
        _token: &CancellationToken,
    ) -> Result<String, CoreError> {
        for item in &init_result.work_items {
            let ticker = Ticker(item.key.clone());
            let upstream = self.docs().get_by_source(self.upstream_source, &ticker.source_id(self.kind));
            let mut inputs = RatingInputs::default();
            if let Some(doc) = upstream {
                inputs.components.insert(self.upstream_source.to_string(), serde_json::json!(doc.metadata));
            }
            let score = self.rating_fn.score(&ticker, &inputs);
            self.write_result(&ticker, step, score)?;
            self.queue().increment_document_count(&JobId::from_string(step_id), self.clock.now()).map_err(storage_err)?;
        }
        Ok(format!("{} tickers rated", init_result.work_items.len()))
    }
}

/// The six component source types `rating_composite` gates on, in the
/// fixed order it reads and reports them.
const COMPONENT_KINDS: [&str; 6] = ["bfs", "cds", "nfr", "pps", "vrs", "ob"];

/// `rating_composite`: reads the six component documents for a ticker,
/// applies the gate (BFS and CDS both `>= 1`), and writes a composite
/// result. A missing component is not an error — its score is treated
/// as the neutral default so the composite always produces a document
/// (§4.J, §8 scenario 6).
pub struct CompositeRatingWorker<C: Clock = SystemClock> {
    rating_fn: Arc<dyn RatingFn>,
    storage: Arc<StorageManager>,
    clock: C,
}

impl CompositeRatingWorker<SystemClock> {
    pub fn new(rating_fn: Arc<dyn RatingFn>, storage: Arc<StorageManager>) -> Self {
        Self { rating_fn, storage, clock: SystemClock }
    }
}

impl<C: Clock> CompositeRatingWorker<C> {
    fn docs(&self) -> DocumentStore<'_> {
        DocumentStore::new(&self.storage)
    }

    fn queue(&self) -> QueueStore<'_> {
        QueueStore::new(&self.storage)
    }

    fn component_score(&self, kind: &str, ticker: &Ticker) -> f64 {
        self.docs()
            .get_by_source(&format!("rating_{kind}"), &ticker.source_id(kind))
            .and_then(|d| d.metadata.get("score").and_then(|v| v.as_f64()))
            .unwrap_or(NEUTRAL_RATIO_DEFAULT)
    }
}

#[async_trait]
impl<C: Clock + Send + Sync> sift_core::DefinitionWorker for CompositeRatingWorker<C> {
    fn get_type(&self) -> WorkerType {
        "rating_composite".to_string()
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
        step: &Step,
        job_def: &JobDefinition,
        _token: &CancellationToken,
    ) -> Result<WorkerInitResult, CoreError> {
        let tickers = extract_tickers(step, job_def);
        Ok(WorkerInitResult::inline(tickers.into_iter().map(|t| WorkItem::new(t.0)).collect()))
    }

    async fn create_jobs(
        &self,
        _ctx: &(dyn WorkerContext + '_),
        step: &Step,
        _job_def: &JobDefinition,
        step_id: &str,
        init_result: &WorkerInitResult,
        _token: &CancellationToken,
    ) -> Result<String, CoreError> {
        let now = self.clock.now();
        for item in &init_result.work_items {
            let ticker = Ticker(item.key.clone());
            let scores: std::collections::BTreeMap<&str, f64> = COMPONENT_KINDS.iter().map(|kind| (*kind, self.component_score(kind, &ticker))).collect();

            let gate_passed = scores["bfs"] >= 1.0 && scores["cds"] >= 1.0;
            // investability weighs PPS alongside the gated components;
            // any missing component already fell back to the neutral
            // default in `component_score`.
            let investability = (scores["pps"] + scores["vrs"] + scores["ob"]) / 3.0;
            let label = if gate_passed { "investable" } else { "watch" };

            let inputs = RatingInputs { components: scores.iter().map(|(k, v)| (k.to_string(), serde_json::json!(v))).collect() };
            let composite = self.rating_fn.score(&ticker, &inputs);

            let source_type = "rating_composite";
            let existing = self.docs().get_by_source(source_type, &ticker.source_id("composite"));
            let id = existing.as_ref().map(|d| d.id.clone()).unwrap_or_else(DocumentId::new);
            let mut doc = Document::new(id, source_type, ticker.source_id("composite"), format!("composite rating: {}", ticker.0), String::new(), now);
            doc.metadata.insert("score".to_string(), serde_json::json!(composite.value));
            doc.metadata.insert("label".to_string(), serde_json::json!(label));
            doc.metadata.insert("gate_passed".to_string(), serde_json::json!(gate_passed));
            doc.metadata.insert("investability".to_string(), serde_json::json!(investability));
            for (k, v) in composite.metadata {
                doc.metadata.insert(k, v);
            }
            doc.add_tag("rating-composite");
            doc.add_tag(ticker.lowercased());
            for tag in &step.output_tags {
                doc.add_tag(tag.clone());
            }
            self.docs().save(doc, now)?;
            self.queue().increment_document_count(&JobId::from_string(step_id), now).map_err(storage_err)?;
        }
        Ok(format!("{} tickers rated", init_result.work_items.len()))
    }
}

/// Build the six component workers plus the composite worker, ready to
/// register with a `WorkerRegistry` (§4.J names: `rating_bfs`,
/// `rating_cds`, `rating_nfr`, `rating_pps`, `rating_vrs`, `rating_ob`,
/// `rating_composite`).
pub fn component_workers(rating_fn: Arc<dyn RatingFn>, storage: Arc<StorageManager>) -> Vec<Arc<dyn sift_core::DefinitionWorker>> {
    const UPSTREAM: [(&str, &str); 6] =
        [("bfs", "fundamentals"), ("cds", "fundamentals"), ("nfr", "fundamentals"), ("pps", "market_data"), ("vrs", "market_data"), ("ob", "market_data")];
    UPSTREAM
        .iter()
        .map(|(kind, upstream)| {
            Arc::new(ComponentRatingWorker::new(kind, upstream, rating_fn.clone(), storage.clone())) as Arc<dyn sift_core::DefinitionWorker>
        })
        .collect()
}
