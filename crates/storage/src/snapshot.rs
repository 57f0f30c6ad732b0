// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic zstd-compressed snapshots of `MaterializedState`, so
//! recovery doesn't have to replay the entire WAL from scratch.
//!
//! On disk: zstd-compressed JSON of `{v, seq, state}`. `v` runs through
//! [`crate::migration::MigrationRegistry`] before deserialization so a
//! snapshot written by an older binary still loads.

use crate::migration::{MigrationError, MigrationRegistry, CURRENT_SNAPSHOT_VERSION};
use crate::state::MaterializedState;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use thiserror::Error;

const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

pub fn save(path: impl AsRef<Path>, state: &MaterializedState, seq: u64) -> Result<(), SnapshotError> {
    let envelope = serde_json::json!({
        "v": CURRENT_SNAPSHOT_VERSION,
        "seq": seq,
        "state": state,
    });
    let json = serde_json::to_vec(&envelope)?;
    let compressed = zstd::encode_all(json.as_slice(), ZSTD_LEVEL)?;

    let tmp_path = path.as_ref().with_extension("tmp");
    let mut file = File::create(&tmp_path)?;
    file.write_all(&compressed)?;
    file.flush()?;
    drop(file);
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Returns `None` when no snapshot exists yet (fresh store: recovery
/// falls back to replaying the whole WAL).
pub fn load(path: impl AsRef<Path>, registry: &MigrationRegistry) -> Result<Option<(MaterializedState, u64)>, SnapshotError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }

    let mut compressed = Vec::new();
    File::open(path)?.read_to_end(&mut compressed)?;
    let json = zstd::decode_all(compressed.as_slice())?;
    let envelope: Value = serde_json::from_slice(&json)?;

    let envelope = registry.migrate_to(envelope, CURRENT_SNAPSHOT_VERSION)?;
    let seq = envelope.get("seq").and_then(Value::as_u64).unwrap_or(0);
    let state: MaterializedState = serde_json::from_value(envelope["state"].clone())?;
    Ok(Some((state, seq)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sift_core::{Document, DocumentId};
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_zstd() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.zst");

        let mut state = MaterializedState::new();
        let doc = Document::new(DocumentId::new(), "jira", "PROJ-1", "title", "body", Utc::now());
        state.documents.insert(doc.id.clone(), doc.clone());

        save(&path, &state, 42).unwrap();
        let registry = MigrationRegistry::new();
        let (loaded, seq) = load(&path, &registry).unwrap().unwrap();

        assert_eq!(seq, 42);
        assert_eq!(loaded.documents.get(&doc.id).unwrap().title, "title");
    }

    #[test]
    fn load_of_missing_path_is_none() {
        let dir = tempdir().unwrap();
        let registry = MigrationRegistry::new();
        assert!(load(dir.path().join("absent.zst"), &registry).unwrap().is_none());
    }
}
