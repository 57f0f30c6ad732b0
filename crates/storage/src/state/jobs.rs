// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::MaterializedState;
use sift_core::{Event, JobStatusRecord};

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::JobEnqueued { job } => {
            if !state.jobs.contains_key(&job.id) {
                state.job_status.insert(job.id.clone(), JobStatusRecord::new(job.id.clone(), job.created_at));
                state.jobs.insert(job.id.clone(), job.clone());
            }
        }

        Event::JobStatusChanged { id, status, error, occurred_at } => {
            let record = state
                .job_status
                .entry(id.clone())
                .or_insert_with(|| JobStatusRecord::new(id.clone(), *occurred_at));
            record.transition(*status, error.clone(), *occurred_at);
        }

        Event::JobProgressUpdated { id, completed_delta, pending_delta, total_delta, failed_delta, occurred_at } => {
            let record = state
                .job_status
                .entry(id.clone())
                .or_insert_with(|| JobStatusRecord::new(id.clone(), *occurred_at));
            record.progress.apply_deltas(*completed_delta, *pending_delta, *total_delta, *failed_delta);
            record.updated_at = *occurred_at;
        }

        Event::JobHeartbeat { id, occurred_at } => {
            if let Some(record) = state.job_status.get_mut(id) {
                record.heartbeat(*occurred_at);
            }
        }

        Event::DocumentCountIncremented { id, delta, occurred_at } => {
            let record = state
                .job_status
                .entry(id.clone())
                .or_insert_with(|| JobStatusRecord::new(id.clone(), *occurred_at));
            record.document_count += delta;
            record.updated_at = *occurred_at;
        }

        Event::UrlSeen { job_id, url_hash, .. } => {
            state.seen_urls.entry(job_id.clone()).or_default().insert(url_hash.clone());
        }

        Event::JobsCleared { .. } => {
            // Status records (including any orphaned ones with no
            // matching `QueueJob`) go first, then the jobs themselves.
            state.job_status.clear();
            state.jobs.clear();
        }

        _ => {}
    }
}
