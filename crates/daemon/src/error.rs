// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The daemon's top-level error type and the exit-code mapping §6's
//! CLI surface names: `0` success, `1` config error, `2` storage
//! failure, `3` fatal runtime.

use crate::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Runbook(#[from] sift_runbook::RunbookError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Engine(#[from] sift_engine::EngineError),

    #[error(transparent)]
    Core(#[from] sift_core::CoreError),
}

impl DaemonError {
    pub fn exit_code(&self) -> i32 {
        match self {
            DaemonError::Config(_) | DaemonError::Runbook(_) => 1,
            DaemonError::Io(_) => 2,
            DaemonError::Core(sift_core::CoreError::StorageFailure(_)) => 2,
            DaemonError::Engine(_) | DaemonError::Core(_) => 3,
        }
    }
}
