// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The embedded K/V store adapter and the facades built on top of it
//! (§4.A-§4.E): append-only WAL, replayed `MaterializedState`,
//! zstd snapshots, and typed stores for documents, config, connectors,
//! job definitions, the job queue, and per-job logs.

pub mod config;
pub mod connectors;
pub mod documents;
pub mod job_definitions;
pub mod kv;
pub mod logs;
pub mod migration;
pub mod queue;
pub mod snapshot;
pub mod state;
pub mod wal;

pub use config::ConfigStore;
pub use connectors::ConnectorStore;
pub use documents::{DocumentStats, DocumentStore, ListOpts};
pub use job_definitions::JobDefinitionStore;
pub use kv::{Filter, QueryOpts, SortSpec, StorageManager};
pub use logs::LogStore;
pub use migration::{Migration, MigrationError, MigrationRegistry, CURRENT_SNAPSHOT_VERSION};
pub use queue::QueueStore;
pub use state::MaterializedState;
pub use wal::{Wal, WalEntry};
