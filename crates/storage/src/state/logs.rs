// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::MaterializedState;
use sift_core::Event;

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::LogAppended { entry } => {
            let lines = state.logs.entry(entry.job_id.clone()).or_default();
            if !lines.iter().any(|l| l.sequence == entry.sequence) {
                lines.push(entry.clone());
            }
            let counter = state.log_line_counters.entry(entry.job_id.clone()).or_insert(1);
            *counter = (*counter).max(entry.line_number + 1);
        }
        Event::LogsDeleted { job_id, .. } => {
            state.logs.remove(job_id);
            state.log_line_counters.remove(job_id);
        }
        _ => {}
    }
}
