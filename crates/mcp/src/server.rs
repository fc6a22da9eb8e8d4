use std::sync::Arc;

use anyhow::{anyhow, Result};
use rmcp::{
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult,
        PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
};

use crate::dispatcher::ToolDispatcher;

/// MCP server exposing the enabled Polymarket tools.
///
/// The tool list comes from the registry built at startup rather than from a
/// compile-time router, so disabled tools are never advertised.
#[derive(Clone)]
pub struct PolymarketMcpServer {
    dispatcher: Arc<ToolDispatcher>,
}

impl PolymarketMcpServer {
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// Serve over stdio until the peer disconnects.
    pub async fn serve_stdio(self) -> Result<()> {
        let service = self
            .serve(rmcp::transport::stdio())
            .await
            .map_err(|err| anyhow!(err))?;

        service.waiting().await.map_err(|err| anyhow!(err))?;

        Ok(())
    }
}

impl ServerHandler for PolymarketMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "polymarket-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Implementation::from_build_env()
            },
            instructions: Some(
                "Polymarket prediction market tools: browse and search markets, read order books \
                 and prices, place and cancel orders, and inspect wallet balances and positions. \
                 Prices are probabilities between 0 and 1; amounts are decimal strings."
                    .into(),
            ),
            ..ServerInfo::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(
            self.dispatcher.registry().tools(),
        ))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self
            .dispatcher
            .call(request.name.as_ref(), request.arguments)
            .await)
    }
}
