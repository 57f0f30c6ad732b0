// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The external protocol adapter (§6): an MCP resource/tool server over
//! `rmcp`, exposing the document store read surface the spec names —
//! `<scheme>://documents/{all,<source_type>,stats,<doc_id>}` resources
//! and `search_documents`/`search_by_reference`/`get_document`/
//! `list_documents` tools. Runs as an optional stdio transport
//! alongside the daemon's cron/worker loops; it never writes to the
//! store, matching the spec's "reachable only through the interfaces
//! §6 names" framing for external collaborators.

use rmcp::handler::server::tool::{Parameters, ToolRouter};
use rmcp::model::{
    AnnotateAble, ErrorData, RawResource, ReadResourceRequestParam, ReadResourceResult, Resource, ResourceContents, ServerCapabilities,
    ServerInfo,
};
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use schemars::JsonSchema;
use serde::Deserialize;
use sift_storage::{DocumentStore, ListOpts, StorageManager};
use std::sync::Arc;

const SCHEME: &str = "sift";

/// The MCP server: a read-only view over the document store, handed a
/// shared `StorageManager` handle the way every other facade is.
#[derive(Clone)]
pub struct DocumentServer {
    storage: Arc<StorageManager>,
    tool_router: ToolRouter<DocumentServer>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchDocumentsParams {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub source_types: Vec<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchByReferenceParams {
    pub reference: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub source_types: Vec<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetDocumentParams {
    pub id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListDocumentsParams {
    pub source: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

#[tool_router]
impl DocumentServer {
    pub fn new(storage: Arc<StorageManager>) -> Self {
        Self { storage, tool_router: Self::tool_router() }
    }

    fn docs(&self) -> DocumentStore<'_> {
        DocumentStore::new(&self.storage)
    }

    #[tool(description = "Full-text search over document title and content")]
    async fn search_documents(&self, Parameters(params): Parameters<SearchDocumentsParams>) -> String {
        let matches = self.docs().full_text_search(&params.query, params.limit);
        let filtered: Vec<_> = matches
            .into_iter()
            .filter(|d| params.source_types.is_empty() || params.source_types.contains(&d.source_type))
            .collect();
        serde_json::to_string(&filtered).unwrap_or_else(|_| "[]".to_string())
    }

    #[tool(description = "Search documents by their source identifier (e.g. a ticker or issue key)")]
    async fn search_by_reference(&self, Parameters(params): Parameters<SearchByReferenceParams>) -> String {
        let matches = self.docs().search_by_identifier(&params.reference);
        let filtered: Vec<_> = matches
            .into_iter()
            .filter(|d| params.source_types.is_empty() || params.source_types.contains(&d.source_type))
            .take(params.limit)
            .collect();
        serde_json::to_string(&filtered).unwrap_or_else(|_| "[]".to_string())
    }

    #[tool(description = "Fetch one document by its opaque ID")]
    async fn get_document(&self, Parameters(params): Parameters<GetDocumentParams>) -> String {
        let id = sift_core::DocumentId::from_string(params.id);
        match self.docs().get_by_id(&id) {
            Some(doc) => serde_json::to_string(&doc).unwrap_or_else(|_| "null".to_string()),
            None => "null".to_string(),
        }
    }

    #[tool(description = "List documents, optionally filtered by source type, with pagination")]
    async fn list_documents(&self, Parameters(params): Parameters<ListDocumentsParams>) -> String {
        let opts = ListOpts { source_type: params.source, limit: Some(params.limit), offset: Some(params.offset), ..Default::default() };
        let docs = self.docs().list(&opts);
        serde_json::to_string(&docs).unwrap_or_else(|_| "[]".to_string())
    }
}

#[tool_handler]
impl ServerHandler for DocumentServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().enable_resources().build(),
            instructions: Some("Read-only access to the rating platform's document store.".into()),
            ..Default::default()
        }
    }

    async fn list_resources(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _ctx: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<rmcp::model::ListResourcesResult, ErrorData> {
        let docs = self.docs();
        let mut resources = vec![
            RawResource::new(format!("{SCHEME}://documents/all"), "all documents").no_annotation(),
            RawResource::new(format!("{SCHEME}://documents/stats"), "document store stats").no_annotation(),
        ];
        for source_type in source_types_seen(&docs) {
            resources.push(RawResource::new(format!("{SCHEME}://documents/{source_type}"), format!("{source_type} documents")).no_annotation());
        }
        Ok(rmcp::model::ListResourcesResult { resources, next_cursor: None })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _ctx: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        let uri = request.uri.as_str();
        let prefix = format!("{SCHEME}://documents/");
        let Some(path) = uri.strip_prefix(&prefix) else {
            return Err(ErrorData::invalid_params(format!("unrecognised resource uri: {uri}"), None));
        };

        let docs = self.docs();
        let body = match path {
            "all" => serde_json::to_string(&docs.list(&ListOpts::default())),
            "stats" => serde_json::to_string(&docs.get_stats()),
            doc_id if doc_id.starts_with("doc_") => {
                let id = sift_core::DocumentId::from_string(doc_id);
                serde_json::to_string(&docs.get_by_id(&id))
            }
            source_type => {
                let opts = ListOpts { source_type: Some(source_type.to_string()), ..Default::default() };
                serde_json::to_string(&docs.list(&opts))
            }
        }
        .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;

        Ok(ReadResourceResult { contents: vec![ResourceContents::text(body, uri)] })
    }
}

fn source_types_seen(docs: &DocumentStore<'_>) -> Vec<String> {
    let mut seen: Vec<String> = docs.list(&ListOpts::default()).into_iter().map(|d| d.source_type).collect();
    seen.sort();
    seen.dedup();
    seen
}
