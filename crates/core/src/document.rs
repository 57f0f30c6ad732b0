// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The uniform document model produced by every content extractor.

use crate::id::DocumentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Level of detail a document was extracted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    Full,
    Summary,
}

crate::simple_display! {
    DetailLevel {
        Full => "full",
        Summary => "summary",
    }
}

/// A single unit of extracted content, uniform across every source type.
///
/// `(source_type, source_id)` is the source tuple that uniquely locates a
/// document and drives upsert (§3, §4.B).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub source_type: String,
    pub source_id: String,
    pub title: String,
    pub content_markdown: String,
    pub url: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Ordered set of tags; duplicates are not added twice.
    #[serde(default)]
    pub tags: Vec<String>,
    pub detail_level: DetailLevel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_synced: Option<DateTime<Utc>>,
    #[serde(default)]
    pub force_sync_pending: bool,
    #[serde(default)]
    pub force_embed_pending: bool,
}

impl Document {
    /// Create a new document, stamping `created_at == updated_at == now`.
    pub fn new(
        id: DocumentId,
        source_type: impl Into<String>,
        source_id: impl Into<String>,
        title: impl Into<String>,
        content_markdown: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            source_type: source_type.into(),
            source_id: source_id.into(),
            title: title.into(),
            content_markdown: content_markdown.into(),
            url: None,
            metadata: BTreeMap::new(),
            tags: Vec::new(),
            detail_level: DetailLevel::Full,
            created_at: now,
            updated_at: now,
            last_synced: None,
            force_sync_pending: false,
            force_embed_pending: false,
        }
    }

    /// Add a tag if it is not already present (ordered set semantics).
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    /// A document matches a tag filter iff its tag set is a superset of
    /// the required set (AND semantics, §4.B).
    pub fn matches_tags(&self, required: &[String]) -> bool {
        required.iter().all(|t| self.tags.contains(t))
    }

    /// Apply the upsert rule: preserve `created_at`, refresh `updated_at`.
    ///
    /// `incoming` carries the new field values; `self` is the existing
    /// record. Returns the merged record.
    pub fn merge_upsert(mut self, mut incoming: Document, now: DateTime<Utc>) -> Document {
        incoming.id = self.id.clone();
        incoming.created_at = self.created_at;
        incoming.updated_at = now;
        std::mem::swap(&mut self, &mut incoming);
        self
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Document {
    pub fn builder_for_test(source_type: &str, source_id: &str) -> Document {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        Document::new(
            DocumentId::new(),
            source_type,
            source_id,
            format!("{source_type}/{source_id}"),
            String::new(),
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_tag_is_idempotent() {
        let mut doc = Document::builder_for_test("jira", "PROJ-1");
        doc.add_tag("alpha");
        doc.add_tag("alpha");
        assert_eq!(doc.tags, vec!["alpha".to_string()]);
    }

    #[test]
    fn matches_tags_requires_superset() {
        let mut doc = Document::builder_for_test("jira", "PROJ-1");
        doc.add_tag("alpha");
        doc.add_tag("beta");
        assert!(doc.matches_tags(&["alpha".to_string()]));
        assert!(!doc.matches_tags(&["gamma".to_string()]));
    }

    #[test]
    fn merge_upsert_preserves_created_at() {
        let original = Document::builder_for_test("jira", "PROJ-1");
        let created = original.created_at;
        let later = created + chrono::Duration::seconds(60);

        let mut incoming = Document::builder_for_test("jira", "PROJ-1");
        incoming.title = "updated title".into();

        let merged = original.merge_upsert(incoming, later);
        assert_eq!(merged.created_at, created);
        assert_eq!(merged.updated_at, later);
        assert_eq!(merged.title, "updated title");
        assert!(merged.updated_at >= merged.created_at);
    }
}
