// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job definition CRUD, read by `sift-engine::manager` when a caller
//! enqueues by name, and written by `sift-runbook`'s loader.

use crate::kv::StorageManager;
use sift_core::{Event, JobDefinition, JobDefinitionId};
use std::io;

pub struct JobDefinitionStore<'a> {
    manager: &'a StorageManager,
}

impl<'a> JobDefinitionStore<'a> {
    pub fn new(manager: &'a StorageManager) -> Self {
        Self { manager }
    }

    pub fn save(&self, definition: JobDefinition) -> io::Result<()> {
        self.manager.transact(|_| (Event::JobDefinitionSaved { definition }, ()))
    }

    pub fn get(&self, id: &JobDefinitionId) -> Option<JobDefinition> {
        self.manager.with_state(|state| state.job_definitions.get(id).cloned())
    }

    pub fn get_by_name(&self, name: &str) -> Option<JobDefinition> {
        self.manager.with_state(|state| state.job_definition_by_name(name).cloned())
    }

    pub fn list(&self) -> Vec<JobDefinition> {
        self.manager.with_state(|state| state.job_definitions.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MaterializedState;
    use crate::wal::Wal;
    use chrono::Utc;
    use sift_core::Step;
    use tempfile::tempdir;

    fn manager() -> (StorageManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let wal = Wal::open(dir.path().join("wal.jsonl"), 0).unwrap();
        (StorageManager::new(wal, MaterializedState::new()), dir)
    }

    #[test]
    fn save_then_get_by_name() {
        let (manager, _dir) = manager();
        let store = JobDefinitionStore::new(&manager);
        let def = JobDefinition::new("nightly", vec![Step::new("collect", "noop", serde_json::json!({}))], Utc::now());
        store.save(def.clone()).unwrap();
        assert_eq!(store.get_by_name("nightly").unwrap().id, def.id);
        assert_eq!(store.get(&def.id).unwrap().name, "nightly");
    }
}
