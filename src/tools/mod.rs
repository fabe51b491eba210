pub mod delete_memory;
pub mod filters;
pub mod get_memory;
pub mod list_memories;
pub mod search_memory;
pub mod store_memory;
pub mod update_memory;

use delete_memory::DeleteMemoryParams;
use filters::resolve_filter;
use get_memory::GetMemoryParams;
use list_memories::{ListMemoriesParams, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use search_memory::SearchMemoryParams;
use std::sync::Arc;
use store_memory::{into_metadata, StoreMemoryParams};
use update_memory::UpdateMemoryParams;

use crate::config::RetrievalConfig;
use crate::memory::types::{ListQuery, Memory};
use crate::memory::{MemoryError, MemoryService};

/// The memvault MCP tool handler. Wraps a [`MemoryService`] and exposes it
/// via the `#[tool_router]` macro. Service calls are synchronous and run on
/// the blocking pool.
#[derive(Clone)]
pub struct MemvaultTools {
    tool_router: ToolRouter<Self>,
    service: MemoryService,
    retrieval: Arc<RetrievalConfig>,
}

#[tool_router]
impl MemvaultTools {
    pub fn new(service: MemoryService, retrieval: Arc<RetrievalConfig>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            service,
            retrieval,
        }
    }

    #[tool(description = "Store a new memory. Content is embedded for semantic search; metadata is an optional JSON object.")]
    async fn store_memory(
        &self,
        Parameters(params): Parameters<StoreMemoryParams>,
    ) -> Result<String, String> {
        let metadata = into_metadata(params.metadata)?;
        tracing::info!(content_len = params.content.len(), "store_memory called");

        let service = self.service.clone();
        let memory =
            run_blocking(move || service.store(&params.content, metadata)).await?;
        to_json(&memory)
    }

    #[tool(description = "Fetch a memory by ID exactly as stored, including superseded or deleted ones.")]
    async fn get_memory(
        &self,
        Parameters(params): Parameters<GetMemoryParams>,
    ) -> Result<String, String> {
        tracing::debug!(id = %params.id, "get_memory called");
        let service = self.service.clone();
        let memory = run_blocking(move || service.get(&params.id)).await?;
        Ok(serde_json::json!({
            "found": memory.is_some(),
            "memory": memory,
        })
        .to_string())
    }

    #[tool(description = "Forget a memory by ID. The record is kept but excluded from search.")]
    async fn delete_memory(
        &self,
        Parameters(params): Parameters<DeleteMemoryParams>,
    ) -> Result<String, String> {
        tracing::info!(id = %params.id, "delete_memory called");
        let service = self.service.clone();
        let id = params.id.clone();
        let success = run_blocking(move || service.delete(&id)).await?;
        Ok(serde_json::json!({ "success": success, "id": params.id }).to_string())
    }

    #[tool(description = "Search memories by meaning. Returns current versions only, most similar first. Optional filters narrow by tags (any match) and created_at range.")]
    async fn search_memory(
        &self,
        Parameters(params): Parameters<SearchMemoryParams>,
    ) -> Result<String, String> {
        let limit = resolve_limit(
            params.limit,
            self.retrieval.default_limit,
            self.retrieval.max_limit,
        )?;
        let filter = resolve_filter(params.filters)?;
        tracing::info!(
            query_len = params.query.len(),
            limit,
            filtered = !filter.is_empty(),
            "search_memory called"
        );

        let service = self.service.clone();
        let query = params.query;
        let memories =
            run_blocking(move || service.search_filtered(&query, limit, &filter)).await?;
        let memories: Vec<Memory> = memories.into_iter().map(Memory::without_embedding).collect();
        Ok(serde_json::json!({
            "memories": memories,
            "total": memories.len(),
            "limit": limit,
        })
        .to_string())
    }

    #[tool(description = "Replace a memory's content. Creates a new version; the old one is kept and points to it.")]
    async fn update_memory(
        &self,
        Parameters(params): Parameters<UpdateMemoryParams>,
    ) -> Result<String, String> {
        let metadata = into_metadata(params.metadata)?;
        tracing::info!(id = %params.id, "update_memory called");

        let service = self.service.clone();
        let id = params.id.clone();
        let memory =
            run_blocking(move || service.update(&id, &params.content, metadata)).await?;
        Ok(serde_json::json!({
            "found": memory.is_some(),
            "memory": memory.map(Memory::without_embedding),
            "superseded": params.id,
        })
        .to_string())
    }

    #[tool(description = "List memories with pagination, newest first unless order is oldest_first. Optional filters narrow by tags (any match) and created_at range.")]
    async fn list_memories(
        &self,
        Parameters(params): Parameters<ListMemoriesParams>,
    ) -> Result<String, String> {
        let query = ListQuery {
            limit: resolve_limit(params.limit, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT)?,
            offset: params.offset.unwrap_or(0),
            include_inactive: params.include_inactive.unwrap_or(false),
            order: params.order.unwrap_or_default(),
            filter: resolve_filter(params.filters)?,
        };
        tracing::debug!(limit = query.limit, offset = query.offset, "list_memories called");

        let (limit, offset) = (query.limit, query.offset);
        let service = self.service.clone();
        let page = run_blocking(move || service.list(&query)).await?;
        let memories: Vec<Memory> = page
            .memories
            .into_iter()
            .map(Memory::without_embedding)
            .collect();
        Ok(serde_json::json!({
            "memories": memories,
            "total": memories.len(),
            "limit": limit,
            "offset": offset,
            "has_more": page.has_more,
        })
        .to_string())
    }

    #[tool(description = "Health check. Returns \"pong\".")]
    async fn ping(&self) -> Result<String, String> {
        Ok("pong".into())
    }
}

#[tool_handler]
impl ServerHandler for MemvaultTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "memvault is a local semantic memory store. Use store_memory to save, \
                 search_memory to recall by meaning, update_memory to revise, and \
                 delete_memory to forget."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

/// Run a service call on the blocking pool, flattening both failure layers into the tool error.
async fn run_blocking<T, F>(f: F) -> Result<T, String>
where
    F: FnOnce() -> Result<T, MemoryError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| format!("memory task failed: {e}"))?
        .map_err(|e| e.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("serialization failed: {e}"))
}

/// Apply the default and reject values outside `1..=max`.
fn resolve_limit(requested: Option<usize>, default: usize, max: usize) -> Result<usize, String> {
    let limit = requested.unwrap_or(default);
    if limit == 0 || limit > max {
        return Err(format!("limit must be between 1 and {max}, got {limit}"));
    }
    Ok(limit)
}
