// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-job log store facade (§4.E): newest-first by default,
//! ordered by `line_number` when present so a single job's lines
//! survive clock skew, falling back to `sequence`.

use crate::kv::StorageManager;
use chrono::{DateTime, Utc};
use sift_core::log_entry::{self, format_sequence};
use sift_core::{Event, JobId, Level, LogEntry};
use std::io;

#[derive(Debug, Clone, Default)]
pub struct LogListOpts {
    pub level: Option<Level>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub struct LogStore<'a> {
    manager: &'a StorageManager,
}

impl<'a> LogStore<'a> {
    pub fn new(manager: &'a StorageManager) -> Self {
        Self { manager }
    }

    /// Append one line: normalize the level, allocate the per-job
    /// `line_number` and the store-wide `sequence`, then record the
    /// fact (§4.E steps 1-4).
    pub fn append(&self, job_id: &JobId, level: &str, message: impl Into<String>, now: DateTime<Utc>) -> io::Result<LogEntry> {
        let level = log_entry::normalize(level);
        let counter = self.manager.next_log_sequence();
        let sequence = format_sequence(now.timestamp_nanos_opt().unwrap_or_default() as u128, counter);

        self.manager.transact(|state| {
            let line_number = state.log_line_counters.get(job_id).copied().unwrap_or(1);
            let entry = LogEntry::new(job_id.clone(), line_number, sequence.clone(), level, message, now);
            (Event::LogAppended { entry: entry.clone() }, entry)
        })
    }

    /// Newest-first by default: prefer `line_number` when both entries
    /// carry one (the common case), else `sequence` (§4.E sorting
    /// helper).
    pub fn list(&self, job_id: &JobId, opts: &LogListOpts) -> Vec<LogEntry> {
        self.manager.with_state(|state| {
            let mut lines: Vec<LogEntry> = state
                .logs
                .get(job_id)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|l| opts.level.map(|lvl| lvl == l.level).unwrap_or(true))
                .collect();

            lines.sort_by(|a, b| b.line_number.cmp(&a.line_number).then_with(|| b.sequence.cmp(&a.sequence)));

            let skip = opts.offset.unwrap_or(0);
            let lines: Vec<LogEntry> = lines.into_iter().skip(skip).collect();
            match opts.limit {
                Some(limit) => lines.into_iter().take(limit).collect(),
                None => lines,
            }
        })
    }

    pub fn count_by_level(&self, job_id: &JobId) -> std::collections::HashMap<Level, usize> {
        self.manager.with_state(|state| {
            let mut counts = std::collections::HashMap::new();
            for line in state.logs.get(job_id).into_iter().flatten() {
                *counts.entry(line.level).or_insert(0) += 1;
            }
            counts
        })
    }

    pub fn delete(&self, job_id: &JobId, now: DateTime<Utc>) -> io::Result<()> {
        self.manager.transact(|_| (Event::LogsDeleted { job_id: job_id.clone(), occurred_at: now }, ()))
    }
}
