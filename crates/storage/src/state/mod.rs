// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state built from WAL replay.

mod config;
mod connectors;
mod documents;
mod job_definitions;
mod jobs;
mod logs;

use serde::{Deserialize, Serialize};
use sift_core::{
    Connector, ConnectorId, Document, DocumentId, Event, JobDefinition, JobDefinitionId, JobId,
    JobStatusRecord, LogEntry, QueueJob,
};
use std::collections::HashMap;

/// All durable state, derived entirely from replaying the WAL. Every
/// field here must be reconstructible from events alone; nothing is
/// written directly.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    pub documents: HashMap<DocumentId, Document>,
    pub config: HashMap<String, sift_core::config_entry::KeyValuePair>,
    pub connectors: HashMap<ConnectorId, Connector>,
    pub job_definitions: HashMap<JobDefinitionId, JobDefinition>,
    pub jobs: HashMap<JobId, QueueJob>,
    pub job_status: HashMap<JobId, JobStatusRecord>,
    pub logs: HashMap<JobId, Vec<LogEntry>>,
    /// Per-job next line number, reset by `LogsDeleted`. Kept alongside
    /// `logs` rather than recomputed from `logs.len()` so a `delete_logs`
    /// that races with an in-flight append cannot resurrect a stale line
    /// number.
    #[serde(default)]
    pub log_line_counters: HashMap<JobId, u64>,
    /// `(job_id, url_hash)` pairs already seen by `mark_url_seen`.
    #[serde(default)]
    pub seen_urls: HashMap<JobId, std::collections::HashSet<String>>,
}

impl MaterializedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct children of `parent_id` (steps of a manager, leaves of a
    /// step), in no particular order.
    pub fn children_of(&self, parent_id: &JobId) -> Vec<&QueueJob> {
        self.jobs.values().filter(|j| j.parent_id.as_ref() == Some(parent_id)).collect()
    }

    pub fn job_definition_by_name(&self, name: &str) -> Option<&JobDefinition> {
        self.job_definitions.values().find(|d| d.name == name)
    }

    /// Wipe one startup-config namespace in place (§6 `delete_on_startup`).
    /// This bypasses the event log deliberately: it is an operator-invoked
    /// reset at boot, not a fact to replay.
    pub fn clear_namespace(&mut self, namespace: &str) {
        match namespace {
            "queue" => {
                self.jobs.clear();
                self.job_status.clear();
                self.logs.clear();
                self.log_line_counters.clear();
                self.seen_urls.clear();
            }
            "documents" => self.documents.clear(),
            "connectors" => self.connectors.clear(),
            "config" => self.config.clear(),
            "job_definitions" => self.job_definitions.clear(),
            _ => {}
        }
    }

    /// Apply a fact to derive the next state. Handlers must be
    /// idempotent: replaying the same event twice (once for immediate
    /// in-process visibility, once again during WAL replay after a
    /// restart) must leave state unchanged the second time.
    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::DocumentUpserted { .. } | Event::DocumentDeleted { .. } => documents::apply(self, event),

            Event::KeyUpdated { .. } => config::apply(self, event),

            Event::ConnectorSaved { .. } | Event::ConnectorDeleted { .. } => connectors::apply(self, event),

            Event::JobDefinitionSaved { .. } => job_definitions::apply(self, event),

            Event::JobEnqueued { .. }
            | Event::JobStatusChanged { .. }
            | Event::JobProgressUpdated { .. }
            | Event::JobHeartbeat { .. }
            | Event::DocumentCountIncremented { .. }
            | Event::UrlSeen { .. } => jobs::apply(self, event),

            Event::LogAppended { .. } | Event::LogsDeleted { .. } => logs::apply(self, event),

            // Pure notification, no persisted state of its own.
            Event::CollectionTriggered { .. } => {}
        }
    }
}
