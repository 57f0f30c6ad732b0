// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The document store facade (§4.B).

use crate::kv::{apply_query, Filter, QueryOpts, SortSpec, StorageManager};
use chrono::{DateTime, Utc};
use regex::RegexBuilder;
use sift_core::{CoreError, CoreResult, Document, DocumentId, Event};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct ListOpts {
    pub source_type: Option<String>,
    pub tags: Vec<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub order_by: Option<String>,
    pub order_desc: bool,
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct DocumentStats {
    pub total: usize,
    pub force_sync_pending: usize,
    pub force_embed_pending: usize,
}

pub struct DocumentStore<'a> {
    manager: &'a StorageManager,
}

impl<'a> DocumentStore<'a> {
    pub fn new(manager: &'a StorageManager) -> Self {
        Self { manager }
    }

    /// Upsert by `(source_type, source_id)`: when an existing document
    /// shares that pair, `created_at` is preserved and the rest of the
    /// incoming fields win (§4.B, §8 upsert round-trip property).
    pub fn save(&self, incoming: Document, now: DateTime<Utc>) -> CoreResult<Document> {
        self.manager
            .transact(|state| {
                let existing = state
                    .documents
                    .values()
                    .find(|d| d.source_type == incoming.source_type && d.source_id == incoming.source_id)
                    .cloned();
                let merged = match existing {
                    Some(existing) => existing.merge_upsert(incoming, now),
                    None => incoming,
                };
                let event = Event::DocumentUpserted { document: merged.clone() };
                (event, merged)
            })
            .map_err(storage_err)
    }

    pub fn delete(&self, id: &DocumentId, now: DateTime<Utc>) -> CoreResult<()> {
        self.manager
            .transact(|_| (Event::DocumentDeleted { id: id.clone(), occurred_at: now }, ()))
            .map_err(storage_err)
    }

    pub fn get_by_id(&self, id: &DocumentId) -> Option<Document> {
        self.manager.with_state(|state| state.documents.get(id).cloned())
    }

    pub fn get_by_source(&self, source_type: &str, source_id: &str) -> Option<Document> {
        self.manager.with_state(|state| {
            state
                .documents
                .values()
                .find(|d| d.source_type == source_type && d.source_id == source_id)
                .cloned()
        })
    }

    pub fn list(&self, opts: &ListOpts) -> Vec<Document> {
        self.manager.with_state(|state| {
            let mut filters = Vec::new();
            if let Some(source_type) = &opts.source_type {
                filters.push(Filter::Eq("source_type".into(), serde_json::Value::String(source_type.clone())));
            }
            let mut query = QueryOpts { filters, ..Default::default() };
            if let Some(field) = &opts.order_by {
                let mut sort = SortSpec::by(field.clone());
                if opts.order_desc {
                    sort = sort.reversed();
                }
                query.sort = Some(sort);
            }
            query.skip = opts.offset;
            query.limit = opts.limit;

            let candidates: Vec<&Document> = state.documents.values().collect();
            apply_query(candidates, &query)
                .into_iter()
                .filter(|d| d.matches_tags(&opts.tags))
                .cloned()
                .collect()
        })
    }

    pub fn count(&self) -> usize {
        self.manager.with_state(|state| state.documents.len())
    }

    pub fn count_by_source(&self, source_type: &str) -> usize {
        self.manager
            .with_state(|state| state.documents.values().filter(|d| d.source_type == source_type).count())
    }

    /// Every document for `source_type`, unlike `get_by_source` which
    /// resolves a single `(source_type, source_id)` pair (§4.B).
    pub fn get_documents_by_source(&self, source_type: &str) -> Vec<Document> {
        self.manager
            .with_state(|state| state.documents.values().filter(|d| d.source_type == source_type).cloned().collect())
    }

    /// Delete every document (§4.B `clear_all`).
    pub fn clear_all(&self) -> CoreResult<()> {
        self.manager.wipe_namespace("documents").map_err(storage_err)
    }

    pub fn get_stats(&self) -> DocumentStats {
        self.manager.with_state(|state| {
            let mut stats = DocumentStats { total: state.documents.len(), ..Default::default() };
            for doc in state.documents.values() {
                if doc.force_sync_pending {
                    stats.force_sync_pending += 1;
                }
                if doc.force_embed_pending {
                    stats.force_embed_pending += 1;
                }
            }
            stats
        })
    }

    /// Substring/regex search over `title`/`content_markdown`. A leading
    /// `case:match` token switches to case-sensitive matching; quoted
    /// phrases are matched literally rather than as a regex (§4.B, §8
    /// scenario 3).
    pub fn full_text_search(&self, query: &str, limit: usize) -> Vec<Document> {
        let (case_sensitive, rest) = match query.strip_prefix("case:match") {
            Some(rest) => (true, rest.trim_start()),
            None => (false, query),
        };
        let (pattern, literal) = match rest.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
            Some(phrase) => (regex::escape(phrase), true),
            None => (rest.to_string(), false),
        };
        let _ = literal;

        let regex = match RegexBuilder::new(&pattern).case_insensitive(!case_sensitive).build() {
            Ok(re) => re,
            Err(_) => return Vec::new(),
        };

        self.manager.with_state(|state| {
            state
                .documents
                .values()
                .filter(|d| regex.is_match(&d.title) || regex.is_match(&d.content_markdown))
                .take(limit)
                .cloned()
                .collect()
        })
    }

    pub fn search_by_identifier(&self, source_id: &str) -> Vec<Document> {
        self.manager
            .with_state(|state| state.documents.values().filter(|d| d.source_id == source_id).cloned().collect())
    }

    pub fn set_force_sync_pending(&self, id: &DocumentId, pending: bool, now: DateTime<Utc>) -> CoreResult<()> {
        let mut doc = self.get_by_id(id).ok_or_else(|| CoreError::NotFound(format!("document {id}")))?;
        doc.force_sync_pending = pending;
        doc.updated_at = now;
        self.manager.transact(|_| (Event::DocumentUpserted { document: doc.clone() }, ())).map_err(storage_err)
    }

    pub fn set_force_embed_pending(&self, id: &DocumentId, pending: bool, now: DateTime<Utc>) -> CoreResult<()> {
        let mut doc = self.get_by_id(id).ok_or_else(|| CoreError::NotFound(format!("document {id}")))?;
        doc.force_embed_pending = pending;
        doc.updated_at = now;
        self.manager.transact(|_| (Event::DocumentUpserted { document: doc.clone() }, ())).map_err(storage_err)
    }

    /// No-op on this adapter: there is no external text index to
    /// rebuild, only the in-memory scan `full_text_search` already uses.
    pub fn rebuild_text_index(&self) {}

    pub fn get_all_tags(&self) -> Vec<String> {
        self.manager.with_state(|state| {
            let set: BTreeSet<String> = state.documents.values().flat_map(|d| d.tags.iter().cloned()).collect();
            set.into_iter().collect()
        })
    }
}

fn storage_err(e: std::io::Error) -> CoreError {
    CoreError::StorageFailure(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MaterializedState;
    use crate::wal::Wal;
    use sift_core::DocumentId;
    use tempfile::tempdir;

    fn manager() -> (StorageManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let wal = Wal::open(dir.path().join("wal.jsonl"), 0).unwrap();
        (StorageManager::new(wal, MaterializedState::new()), dir)
    }

    #[test]
    fn save_preserves_created_at_on_resave() {
        let (manager, _dir) = manager();
        let store = DocumentStore::new(&manager);
        let t0 = Utc::now();
        let doc = Document::new(DocumentId::new(), "jira", "PROJ-1", "title", "body", t0);
        let saved = store.save(doc, t0).unwrap();

        let t1 = t0 + chrono::Duration::seconds(30);
        let mut update = Document::new(DocumentId::new(), "jira", "PROJ-1", "title v2", "body v2", t1);
        update.id = saved.id.clone();
        let saved2 = store.save(update, t1).unwrap();

        assert_eq!(saved2.created_at, t0);
        assert!(saved2.updated_at >= saved2.created_at);
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn full_text_search_is_case_insensitive_by_default() {
        let (manager, _dir) = manager();
        let store = DocumentStore::new(&manager);
        let now = Utc::now();
        store.save(Document::new(DocumentId::new(), "jira", "PROJ-1", "Widget Launch", "", now), now).unwrap();
        assert_eq!(store.full_text_search("widget", 10).len(), 1);
    }

    #[test]
    fn get_documents_by_source_returns_every_match() {
        let (manager, _dir) = manager();
        let store = DocumentStore::new(&manager);
        let now = Utc::now();
        store.save(Document::new(DocumentId::new(), "jira", "PROJ-1", "one", "", now), now).unwrap();
        store.save(Document::new(DocumentId::new(), "jira", "PROJ-2", "two", "", now), now).unwrap();
        store.save(Document::new(DocumentId::new(), "web", "page-1", "three", "", now), now).unwrap();

        let jira_docs = store.get_documents_by_source("jira");
        assert_eq!(jira_docs.len(), 2);
        assert!(jira_docs.iter().all(|d| d.source_type == "jira"));
    }

    #[test]
    fn clear_all_removes_every_document() {
        let (manager, _dir) = manager();
        let store = DocumentStore::new(&manager);
        let now = Utc::now();
        store.save(Document::new(DocumentId::new(), "jira", "PROJ-1", "one", "", now), now).unwrap();
        store.save(Document::new(DocumentId::new(), "web", "page-1", "two", "", now), now).unwrap();

        store.clear_all().unwrap();
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn full_text_search_case_match_is_sensitive() {
        let (manager, _dir) = manager();
        let store = DocumentStore::new(&manager);
        let now = Utc::now();
        store.save(Document::new(DocumentId::new(), "jira", "PROJ-1", "Widget Launch", "", now), now).unwrap();
        assert_eq!(store.full_text_search("case:match widget", 10).len(), 0);
        assert_eq!(store.full_text_search("case:match Widget", 10).len(), 1);
    }
}
