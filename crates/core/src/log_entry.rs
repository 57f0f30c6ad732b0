// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job log lines (§3, §4.E).

use crate::id::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Trc,
    Dbg,
    Inf,
    Wrn,
    Err,
}

crate::simple_display! {
    Level {
        Trc => "TRC",
        Dbg => "DBG",
        Inf => "INF",
        Wrn => "WRN",
        Err => "ERR",
    }
}

/// One log line appended via `append_log`.
///
/// `line_number` is monotone per job (reset to 0 by `delete_logs`);
/// `sequence` is monotone across the entire store (§4.E).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub job_id: JobId,
    pub line_number: u64,
    pub sequence: String,
    pub level: Level,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(
        job_id: JobId,
        line_number: u64,
        sequence: String,
        level: Level,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id,
            line_number,
            sequence,
            level,
            message: message.into(),
            created_at: now,
        }
    }
}

/// Normalize a free-form level string to its 3-letter code (§4.E step
/// 1): `info→INF`, `warn|warning→WRN`, `error→ERR`, `debug→DBG`,
/// `trace→TRC`; anything else falls back to `INF`.
pub fn normalize(input: &str) -> Level {
    match input.to_lowercase().as_str() {
        "warn" | "warning" => Level::Wrn,
        "error" => Level::Err,
        "debug" => Level::Dbg,
        "trace" => Level::Trc,
        _ => Level::Inf,
    }
}

/// Format a global sequence token: `{nanos:019}_{counter:010}` (§4.E),
/// sortable lexicographically in creation order.
pub fn format_sequence(epoch_nanos: u128, counter: u64) -> String {
    format!("{epoch_nanos:019}_{counter:010}")
}
