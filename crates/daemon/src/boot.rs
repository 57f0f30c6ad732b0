// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Boot sequence: apply the startup reset knobs, open and replay the
//! WAL, load config through `sift-runbook`, register the rating
//! workers, and reconcile any in-flight jobs left by an ungraceful
//! shutdown (§4.I `reconcile_on_boot`).

use crate::config::DaemonConfig;
use crate::error::DaemonError;
use chrono::Utc;
use sift_core::{Bus, WorkerRegistry};
use sift_engine::{component_workers, CompositeRatingWorker, JobManager, NeutralRatingFn, Scheduler};
use sift_runbook::{ConfigLoader, FsConfigLoader};
use sift_storage::{ConfigStore, ConnectorStore, JobDefinitionStore, MaterializedState, StorageManager, Wal};
use std::sync::Arc;

/// Everything booted and ready to run: the storage handle, the job
/// manager, the scheduler (not yet started), and the bus every
/// component publishes through.
pub struct Daemon {
    pub storage: Arc<StorageManager>,
    pub manager: Arc<JobManager>,
    pub scheduler: Arc<Scheduler>,
    pub bus: Arc<Bus>,
}

const WAL_FILE_NAME: &str = "wal.jsonl";

/// Run the full boot sequence against `config` (§6 "Persisted layout",
/// §4.I `reconcile_on_boot`).
pub async fn boot(config: &DaemonConfig) -> Result<Daemon, DaemonError> {
    if config.reset_on_startup && config.data_dir.exists() {
        tracing::warn!(dir = %config.data_dir.display(), "reset_on_startup set, wiping data directory");
        std::fs::remove_dir_all(&config.data_dir)?;
    }
    std::fs::create_dir_all(&config.data_dir)?;

    let wal_path = config.data_dir.join(WAL_FILE_NAME);
    let mut wal = Wal::open(&wal_path, 0)?;
    let mut state = MaterializedState::new();
    while let Some(entry) = wal.next_unprocessed()? {
        state.apply_event(&entry.event);
    }
    let storage = Arc::new(StorageManager::new(wal, state));

    for namespace in &config.delete_on_startup {
        tracing::info!(namespace = %namespace, "delete_on_startup: wiping namespace");
        storage.wipe_namespace(namespace)?;
    }

    load_config(&storage, &config.config_root)?;

    let mut registry = WorkerRegistry::new();
    let rating_fn = Arc::new(NeutralRatingFn);
    for worker in component_workers(rating_fn.clone(), storage.clone()) {
        registry.register(worker);
    }
    registry.register(Arc::new(CompositeRatingWorker::new(rating_fn, storage.clone())));
    let registry = Arc::new(registry);

    let bus = Arc::new(Bus::new());
    let manager = Arc::new(JobManager::new(storage.clone(), registry));
    let scheduler = Arc::new(Scheduler::new(bus.clone()));

    let recovered = manager.reconcile_on_boot()?;
    if recovered > 0 {
        tracing::info!(count = recovered, "reconciled in-flight jobs left running by an ungraceful shutdown");
    }

    register_scheduled_definitions(&storage, &manager, &scheduler)?;

    Ok(Daemon { storage, manager, scheduler, bus })
}

/// Load job definitions, connectors, variables, and `.env` from
/// `config_root` and persist them (§6 external interfaces).
fn load_config(storage: &Arc<StorageManager>, config_root: &std::path::Path) -> Result<(), DaemonError> {
    let loader = FsConfigLoader::under(config_root);
    let now = Utc::now();

    let mut vars = loader.load_dotenv()?;
    let config_store = ConfigStore::new(storage);
    for entry in loader.load_variables()? {
        config_store.set(&entry.key, entry.value.clone(), now)?;
        vars.insert(entry.key, entry.value);
    }

    let connectors = ConnectorStore::new(storage);
    for connector in loader.load_connectors(&vars, now) {
        connectors.save(connector)?;
    }

    let definitions = JobDefinitionStore::new(storage);
    for mut definition in loader.load_job_definitions(now) {
        if let Some(existing) = definitions.get_by_name(&definition.name) {
            definition.id = existing.id;
            definition.created_at = existing.created_at;
        }
        definitions.save(definition)?;
    }

    Ok(())
}

/// Register every enabled, cron-scheduled job definition with the
/// scheduler; each tick enqueues-and-runs the definition to completion
/// (§4.G/§4.I composition).
fn register_scheduled_definitions(storage: &Arc<StorageManager>, manager: &Arc<JobManager>, scheduler: &Arc<Scheduler>) -> Result<(), DaemonError> {
    let definitions = JobDefinitionStore::new(storage);
    for def in definitions.list() {
        let (Some(schedule), true) = (def.schedule.clone(), def.enabled) else { continue };
        let def_id = def.id.clone();
        let manager = manager.clone();
        scheduler.register_job(def.name.clone(), &schedule, Arc::new(move || {
            let manager = manager.clone();
            let def_id = def_id.clone();
            Box::pin(async move { manager.enqueue_and_run(&def_id, serde_json::Value::Null).await.map(|_| ()) })
        }))?;
    }
    Ok(())
}
