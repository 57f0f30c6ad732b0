// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-layer error wrapper, matching the crate-per-layer
//! `thiserror` style: storage/core failures are wrapped with `#[from]`
//! rather than collapsed to a string.

use sift_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("storage failure: {0}")]
    Storage(#[from] std::io::Error),

    #[error("scheduler already running")]
    SchedulerAlreadyRunning,

    #[error("duplicate scheduled job name: {0}")]
    DuplicateJobName(String),

    #[error("invalid cron expression '{expr}': {source}")]
    InvalidCronExpression { expr: String, source: cron::error::Error },

    #[error("job definition not found: {0}")]
    DefinitionNotFound(String),

    #[error("manager job not found: {0}")]
    ManagerNotFound(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
