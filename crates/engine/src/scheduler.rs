// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The cron scheduler (§4.G): a process-wide mutex serialises every
//! registered job body so that at most one is ever executing, and an
//! overlapping tick is dropped rather than queued. Each job's own
//! cadence is a real cron expression parsed by the `cron` crate, driven
//! by a `tokio::time::sleep_until` loop per registration — this is the
//! one place the runtime departs from the interval-only timer the
//! teacher's cron handler used, since the rating platform's schedules
//! are cron expressions, not fixed durations.

use chrono::{DateTime, Utc};
use cron::Schedule;
use parking_lot::Mutex as SyncMutex;
use sift_core::bus::Bus;
use sift_core::{Clock, Event, JobId, SystemClock};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::error::{EngineError, EngineResult};

pub type JobResult = Result<(), EngineError>;
pub type JobFuture = Pin<Box<dyn Future<Output = JobResult> + Send>>;
pub type JobHandler = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// A snapshot of one registered job's scheduling state, as returned by
/// `get_job_status`/`get_all_job_statuses`.
#[derive(Clone)]
pub struct JobEntry {
    pub name: String,
    pub schedule: String,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub is_running: bool,
    pub last_error: Option<String>,
}

struct Registration {
    schedule: Schedule,
    expr: String,
    handler: JobHandler,
    enabled: bool,
    last_run: Option<DateTime<Utc>>,
    is_running: bool,
    last_error: Option<String>,
    drive_task: Option<JoinHandle<()>>,
}

/// Holds the cron runtime. `global_mu` is the execution-serialising
/// lock §4.G describes; `registry` guards the job map itself, a
/// separate lock so job-body execution never blocks a concurrent
/// `register_job`/`get_job_status` call.
pub struct Scheduler<C: Clock = SystemClock> {
    global_mu: Arc<AsyncMutex<()>>,
    registry: Arc<SyncMutex<HashMap<String, Registration>>>,
    bus: Arc<Bus>,
    clock: C,
    running: AtomicBool,
}

impl Scheduler<SystemClock> {
    pub fn new(bus: Arc<Bus>) -> Self {
        Self::with_clock(bus, SystemClock)
    }
}

impl<C: Clock> Scheduler<C> {
    pub fn with_clock(bus: Arc<Bus>, clock: C) -> Self {
        Self { global_mu: Arc::new(AsyncMutex::new(())), registry: Arc::new(SyncMutex::new(HashMap::new())), bus, clock, running: AtomicBool::new(false) }
    }

    /// Start the scheduler once; re-entry while already running is an
    /// error (§4.G `start`).
    pub fn start(&self) -> EngineResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(EngineError::SchedulerAlreadyRunning);
        }
        let names: Vec<String> = self.registry.lock().keys().cloned().collect();
        for name in names {
            self.arm(&name);
        }
        Ok(())
    }

    /// Register a new job; duplicate names are refused (§4.G
    /// `register_job`). The job is enabled and, if the scheduler is
    /// already running, immediately armed.
    pub fn register_job(&self, name: impl Into<String>, cron_expr: &str, handler: JobHandler) -> EngineResult<()> {
        let name = name.into();
        let schedule = Schedule::from_str(cron_expr)
            .map_err(|source| EngineError::InvalidCronExpression { expr: cron_expr.to_string(), source })?;
        {
            let mut registry = self.registry.lock();
            if registry.contains_key(&name) {
                return Err(EngineError::DuplicateJobName(name));
            }
            registry.insert(
                name.clone(),
                Registration {
                    schedule,
                    expr: cron_expr.to_string(),
                    handler,
                    enabled: true,
                    last_run: None,
                    is_running: false,
                    last_error: None,
                    drive_task: None,
                },
            );
        }
        if self.running.load(Ordering::SeqCst) {
            self.arm(&name);
        }
        Ok(())
    }

    /// Re-attach a disabled job to the drive loop, preserving its
    /// logical registration (§4.G `enable`).
    pub fn enable(&self, name: &str) {
        {
            let mut registry = self.registry.lock();
            if let Some(reg) = registry.get_mut(name) {
                reg.enabled = true;
            } else {
                return;
            }
        }
        if self.running.load(Ordering::SeqCst) {
            self.arm(name);
        }
    }

    /// Detach a job from the drive loop without forgetting it (§4.G
    /// `disable`).
    pub fn disable(&self, name: &str) {
        let mut registry = self.registry.lock();
        if let Some(reg) = registry.get_mut(name) {
            reg.enabled = false;
            if let Some(task) = reg.drive_task.take() {
                task.abort();
            }
        }
    }

    fn arm(&self, name: &str) {
        let (schedule, handler) = {
            let registry = self.registry.lock();
            match registry.get(name) {
                Some(reg) if reg.enabled => (reg.schedule.clone(), reg.handler.clone()),
                _ => return,
            }
        };
        let registry = self.registry.clone();
        let global_mu = self.global_mu.clone();
        let name = name.to_string();
        let task = tokio::spawn(drive_loop(name.clone(), schedule, handler, global_mu, registry));
        if let Some(reg) = self.registry.lock().get_mut(&name) {
            reg.drive_task = Some(task);
        }
    }

    /// Publish `collection_triggered` synchronously (§4.G
    /// `trigger_collection_now`).
    pub async fn trigger_collection_now(&self, job_id: JobId, source_id: impl Into<String>, source_type: impl Into<String>) -> EngineResult<()> {
        let event = Event::CollectionTriggered { job_id, source_id: source_id.into(), source_type: source_type.into(), occurred_at: self.clock.now() };
        self.bus.publish_sync(&event).await.map_err(|e| EngineError::Core(sift_core::CoreError::StorageFailure(e.to_string())))
    }

    pub fn get_job_status(&self, name: &str) -> Option<JobEntry> {
        let registry = self.registry.lock();
        registry.get(name).map(|reg| to_entry(name, reg))
    }

    pub fn get_all_job_statuses(&self) -> Vec<JobEntry> {
        let registry = self.registry.lock();
        registry.iter().map(|(name, reg)| to_entry(name, reg)).collect()
    }
}

fn to_entry(name: &str, reg: &Registration) -> JobEntry {
    let next_run = reg.schedule.upcoming(Utc).next();
    JobEntry {
        name: name.to_string(),
        schedule: reg.expr.clone(),
        enabled: reg.enabled,
        last_run: reg.last_run,
        next_run,
        is_running: reg.is_running,
        last_error: reg.last_error.clone(),
    }
}

/// Sleep until each upcoming tick and attempt execution. A tick that
/// lands while the global lock is already held is dropped, not queued
/// (§4.G execution wrapper).
async fn drive_loop(name: String, schedule: Schedule, handler: JobHandler, global_mu: Arc<AsyncMutex<()>>, registry: Arc<SyncMutex<HashMap<String, Registration>>>) {
    let mut upcoming = schedule.upcoming(Utc);
    loop {
        let Some(next) = upcoming.next() else { return };
        let now = Utc::now();
        if next > now {
            let delta = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(delta).await;
        }
        execute_job(&name, &handler, &global_mu, &registry).await;
    }
}

/// Acquire the global mutex (non-blocking — a held lock means a
/// previous tick is still running and this one is dropped), stamp
/// `last_run`, run the handler under panic recovery, and always clear
/// `is_running` (§4.G execution wrapper).
async fn execute_job(name: &str, handler: &JobHandler, global_mu: &AsyncMutex<()>, registry: &SyncMutex<HashMap<String, Registration>>) {
    let Ok(_guard) = global_mu.try_lock() else {
        tracing::debug!(job = name, "tick dropped: previous execution still running");
        return;
    };

    let now = Utc::now();
    {
        let mut reg = registry.lock();
        if let Some(entry) = reg.get_mut(name) {
            entry.last_run = Some(now);
            entry.is_running = true;
        }
    }

    let fut = handler();
    let outcome = tokio::spawn(fut).await;
    let last_error = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(join_err) if join_err.is_panic() => Some(format!("panic: {join_err}")),
        Err(join_err) => Some(join_err.to_string()),
    };

    let mut reg = registry.lock();
    if let Some(entry) = reg.get_mut(name) {
        entry.is_running = false;
        entry.last_error = last_error;
    }
}
