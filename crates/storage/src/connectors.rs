// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connector CRUD, built on 4.A the same way the document and config
//! facades are. Not one of the lettered components in its own right —
//! `sift-runbook` is the thing that actually loads connector config —
//! but the job manager and MCP adapter both need somewhere to read
//! saved connectors back from.

use crate::kv::StorageManager;
use sift_core::{Connector, ConnectorId, Event};
use std::io;

pub struct ConnectorStore<'a> {
    manager: &'a StorageManager,
}

impl<'a> ConnectorStore<'a> {
    pub fn new(manager: &'a StorageManager) -> Self {
        Self { manager }
    }

    pub fn save(&self, connector: Connector) -> io::Result<Connector> {
        self.manager.transact(|_| (Event::ConnectorSaved { connector: connector.clone() }, connector))
    }

    pub fn delete(&self, id: &ConnectorId, now: chrono::DateTime<chrono::Utc>) -> io::Result<()> {
        self.manager.transact(|_| (Event::ConnectorDeleted { id: id.clone(), occurred_at: now }, ()))
    }

    pub fn get(&self, id: &ConnectorId) -> Option<Connector> {
        self.manager.with_state(|state| state.connectors.get(id).cloned())
    }

    pub fn get_by_name(&self, name: &str) -> Option<Connector> {
        self.manager.with_state(|state| state.connectors.values().find(|c| c.name == name).cloned())
    }

    pub fn list(&self) -> Vec<Connector> {
        self.manager.with_state(|state| state.connectors.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MaterializedState;
    use crate::wal::Wal;
    use chrono::Utc;
    use tempfile::tempdir;

    fn manager() -> (StorageManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let wal = Wal::open(dir.path().join("wal.jsonl"), 0).unwrap();
        (StorageManager::new(wal, MaterializedState::new()), dir)
    }

    #[test]
    fn save_then_get_by_name() {
        let (manager, _dir) = manager();
        let store = ConnectorStore::new(&manager);
        let connector = Connector::new("github-main", "github", serde_json::json!({}), Utc::now());
        store.save(connector.clone()).unwrap();
        assert_eq!(store.get_by_name("github-main").unwrap().id, connector.id);
    }

    #[test]
    fn delete_removes_connector() {
        let (manager, _dir) = manager();
        let store = ConnectorStore::new(&manager);
        let connector = Connector::new("github-main", "github", serde_json::json!({}), Utc::now());
        store.save(connector.clone()).unwrap();
        store.delete(&connector.id, Utc::now()).unwrap();
        assert!(store.get(&connector.id).is_none());
    }
}
