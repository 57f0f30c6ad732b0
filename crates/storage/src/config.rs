// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The key/value config store facade (§4.C): a thin wrapper over 4.A
//! keyed by the normalized form of the key.

use crate::kv::StorageManager;
use chrono::{DateTime, Utc};
use sift_core::config_entry::{normalize, KeyValuePair};
use sift_core::Event;
use std::io;

pub struct ConfigStore<'a> {
    manager: &'a StorageManager,
}

impl<'a> ConfigStore<'a> {
    pub fn new(manager: &'a StorageManager) -> Self {
        Self { manager }
    }

    pub fn get(&self, key: &str) -> Option<KeyValuePair> {
        let key = normalize(key);
        self.manager.with_state(|state| state.config.get(&key).cloned())
    }

    pub fn set(&self, key: &str, value: impl Into<String>, now: DateTime<Utc>) -> io::Result<KeyValuePair> {
        let key = normalize(key);
        let value = value.into();
        self.manager.transact(|state| {
            let existing = state.config.get(&key).cloned();
            let is_new = existing.is_none();
            let old_value = existing.as_ref().map(|kv| kv.value.clone());
            let event = Event::KeyUpdated {
                key_name: key.clone(),
                old_value,
                new_value: value.clone(),
                is_new,
                occurred_at: now,
            };
            let (description, created_at) =
                existing.map(|kv| (kv.description, kv.created_at)).unwrap_or((String::new(), now));
            let entry = KeyValuePair { key: key.clone(), value: value.clone(), description, created_at, updated_at: now };
            (event, entry)
        })
    }

    pub fn list(&self) -> Vec<KeyValuePair> {
        self.manager.with_state(|state| state.config.values().cloned().collect())
    }
}
