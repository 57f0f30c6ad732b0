// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned snapshot migration.
//!
//! A snapshot on disk is `{v, seq, state}`. `v` is the schema version of
//! `state`; `seq` is the WAL sequence the snapshot was taken at. Loading a
//! snapshot written by an older binary runs it through the registered
//! migration chain before it is deserialized into [`crate::state::MaterializedState`].

use serde_json::Value;
use thiserror::Error;

pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MigrationError {
    #[error("snapshot version {0} is newer than this binary supports ({1})")]
    TooNew(u32, u32),

    #[error("no migration path from version {0} to {1}")]
    NoPath(u32, u32),
}

pub trait Migration: Send + Sync {
    fn source_version(&self) -> u32;
    fn target_version(&self) -> u32;
    fn migrate(&self, snapshot: &mut Value) -> Result<(), MigrationError>;
}

#[derive(Default)]
pub struct MigrationRegistry {
    migrations: Vec<Box<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, migration: Box<dyn Migration>) {
        self.migrations.push(migration);
    }

    /// Migrate `snapshot` (a `{v, seq, state}` document) forward to
    /// `target_version`, applying each registered migration in sequence.
    pub fn migrate_to(&self, mut snapshot: Value, target_version: u32) -> Result<Value, MigrationError> {
        let current_version = snapshot
            .get("v")
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .unwrap_or(0);

        if current_version == target_version {
            return Ok(snapshot);
        }
        if current_version > target_version {
            return Err(MigrationError::TooNew(current_version, target_version));
        }

        let mut version = current_version;
        while version < target_version {
            let step = self
                .migrations
                .iter()
                .find(|m| m.source_version() == version)
                .ok_or(MigrationError::NoPath(current_version, target_version))?;

            step.migrate(&mut snapshot)?;
            version = step.target_version();
            snapshot["v"] = Value::from(version);
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod tests;
