// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event vocabulary: every fact the job execution subsystem records,
//! whether it mutates persisted state, fires a bus subscriber, or both.
//!
//! One closed enum backs the WAL, `MaterializedState::apply`, and the bus
//! dispatch in `sift-core::bus` — mirroring how a single event stream
//! drives both persistence and notification. Each variant carries the
//! timestamp it occurred at so replay never has to consult a live clock.

use crate::connector::Connector;
use crate::document::Document;
use crate::id::{ConnectorId, DocumentId, JobDefinitionId, JobId};
use crate::job::{JobStatus, QueueJob};
use crate::job_definition::JobDefinition;
use crate::log_entry::LogEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Fired when the scheduler or job manager kicks off a collection
    /// step; subscribers include the UI's activity feed.
    CollectionTriggered {
        job_id: JobId,
        source_id: String,
        source_type: String,
        occurred_at: DateTime<Utc>,
    },
    /// Fired on every config-store write, successful or not otherwise.
    KeyUpdated {
        key_name: String,
        old_value: Option<String>,
        new_value: String,
        is_new: bool,
        occurred_at: DateTime<Utc>,
    },

    DocumentUpserted { document: Document },
    DocumentDeleted { id: DocumentId, occurred_at: DateTime<Utc> },

    ConnectorSaved { connector: Connector },
    ConnectorDeleted { id: ConnectorId, occurred_at: DateTime<Utc> },

    JobDefinitionSaved { definition: JobDefinition },

    JobEnqueued { job: QueueJob },
    JobStatusChanged {
        id: JobId,
        status: JobStatus,
        error: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    JobProgressUpdated {
        id: JobId,
        completed_delta: i64,
        pending_delta: i64,
        total_delta: i64,
        failed_delta: i64,
        occurred_at: DateTime<Utc>,
    },
    JobHeartbeat { id: JobId, occurred_at: DateTime<Utc> },
    DocumentCountIncremented { id: JobId, delta: u64, occurred_at: DateTime<Utc> },

    LogAppended { entry: LogEntry },
    LogsDeleted { job_id: JobId, occurred_at: DateTime<Utc> },

    /// Recorded by `mark_url_seen`'s insert-on-composite-key guard
    /// (§4.D); `is_new` reflects whether the URL was absent from the
    /// set before this event, so replay can reproduce the same answer
    /// the original caller got.
    UrlSeen { job_id: JobId, url_hash: String, is_new: bool, occurred_at: DateTime<Utc> },

    /// `QueueStore::clear_all`: wipe every job and status record,
    /// including orphaned status records with no matching `QueueJob`
    /// (§4.D `ClearAllJobs`).
    JobsCleared { occurred_at: DateTime<Utc> },
}

impl Event {
    /// The bus subscription key / WAL discriminant, stable across
    /// releases (used for `Bus::subscribe` and log lines).
    pub fn name(&self) -> &'static str {
        match self {
            Event::CollectionTriggered { .. } => "collection_triggered",
            Event::KeyUpdated { .. } => "key_updated",
            Event::DocumentUpserted { .. } => "document_upserted",
            Event::DocumentDeleted { .. } => "document_deleted",
            Event::ConnectorSaved { .. } => "connector_saved",
            Event::ConnectorDeleted { .. } => "connector_deleted",
            Event::JobDefinitionSaved { .. } => "job_definition_saved",
            Event::JobEnqueued { .. } => "job_enqueued",
            Event::JobStatusChanged { .. } => "job_status_changed",
            Event::JobProgressUpdated { .. } => "job_progress_updated",
            Event::JobHeartbeat { .. } => "job_heartbeat",
            Event::DocumentCountIncremented { .. } => "document_count_incremented",
            Event::LogAppended { .. } => "log_appended",
            Event::LogsDeleted { .. } => "logs_deleted",
            Event::UrlSeen { .. } => "url_seen",
            Event::JobsCleared { .. } => "jobs_cleared",
        }
    }

    /// The startup-config namespace this event belongs to (§6
    /// `delete_on_startup`), or `None` for events with no namespace of
    /// their own (e.g. the purely notificational `CollectionTriggered`).
    pub fn namespace(&self) -> Option<&'static str> {
        match self {
            Event::DocumentUpserted { .. } | Event::DocumentDeleted { .. } => Some("documents"),
            Event::ConnectorSaved { .. } | Event::ConnectorDeleted { .. } => Some("connectors"),
            Event::KeyUpdated { .. } => Some("config"),
            Event::JobDefinitionSaved { .. } => Some("job_definitions"),
            Event::JobEnqueued { .. }
            | Event::JobStatusChanged { .. }
            | Event::JobProgressUpdated { .. }
            | Event::JobHeartbeat { .. }
            | Event::DocumentCountIncremented { .. }
            | Event::UrlSeen { .. }
            | Event::LogAppended { .. }
            | Event::LogsDeleted { .. }
            | Event::JobsCleared { .. } => Some("queue"),
            Event::CollectionTriggered { .. } => None,
        }
    }

    /// The job this event concerns, when it concerns exactly one
    /// (§4.F handlers use this to filter without parsing a payload).
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Event::CollectionTriggered { job_id, .. } => Some(job_id),
            Event::JobEnqueued { job } => Some(&job.id),
            Event::JobStatusChanged { id, .. }
            | Event::JobProgressUpdated { id, .. }
            | Event::JobHeartbeat { id, .. }
            | Event::DocumentCountIncremented { id, .. } => Some(id),
            Event::LogAppended { entry } => Some(&entry.job_id),
            Event::LogsDeleted { job_id, .. } => Some(job_id),
            Event::UrlSeen { job_id, .. } => Some(job_id),
            _ => None,
        }
    }

    /// A short, human-readable one-liner for the log store (§4.E
    /// lifecycle lines).
    pub fn log_summary(&self) -> String {
        match self {
            Event::CollectionTriggered { job_id, source_type, .. } => {
                format!("collection_triggered job_id={job_id} source={source_type}")
            }
            Event::KeyUpdated { key_name, .. } => format!("key_updated key={key_name}"),
            Event::DocumentUpserted { document } => format!("document_upserted id={}", document.id),
            Event::DocumentDeleted { id, .. } => format!("document_deleted id={id}"),
            Event::ConnectorSaved { connector } => format!("connector_saved name={}", connector.name),
            Event::ConnectorDeleted { id, .. } => format!("connector_deleted id={id}"),
            Event::JobDefinitionSaved { definition } => format!("job_definition_saved name={}", definition.name),
            Event::JobEnqueued { job } => format!("job_enqueued id={} type={}", job.id, job.kind),
            Event::JobStatusChanged { id, status, .. } => format!("job_status_changed id={id} status={status}"),
            Event::JobProgressUpdated { id, .. } => format!("job_progress_updated id={id}"),
            Event::JobHeartbeat { id, .. } => format!("job_heartbeat id={id}"),
            Event::DocumentCountIncremented { id, delta, .. } => {
                format!("document_count_incremented id={id} delta={delta}")
            }
            Event::LogAppended { entry } => format!("log_appended job_id={}", entry.job_id),
            Event::LogsDeleted { job_id, .. } => format!("logs_deleted job_id={job_id}"),
            Event::UrlSeen { job_id, is_new, .. } => format!("url_seen job_id={job_id} is_new={is_new}"),
            Event::JobsCleared { .. } => "jobs_cleared".to_string(),
        }
    }
}
