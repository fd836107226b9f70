//! MCP server implementation using rmcp.
//!
//! Exposes the enrollment tools over stdio or streamable HTTP.

use std::sync::Arc;
use tokio::sync::RwLock;

use anyhow::Result;
use axum::Router;
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use rmcp::{
    ErrorData as McpError,
    handler::server::ServerHandler,
    model::*,
    service::{RequestContext, RoleServer},
};

use crate::auth::{AuthExtractor, CallerContext};
use crate::tools::support::{UNAUTHORIZED, auth_error};
use crate::tools::{ToolContext, ToolRegistry};

/// Type alias for HTTP request parts stored in rmcp extensions.
type HttpParts = http::request::Parts;

/// Credentials and client metadata read from HTTP request headers.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RequestCredentials {
    pub authorization: Option<String>,
    pub api_key: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestCredentials {
    /// Read credentials from request headers. `api_key_header` names the
    /// API key header (normally `X-API-Key`).
    pub fn from_headers(headers: &http::HeaderMap, api_key_header: &str) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };

        Self {
            authorization: header(http::header::AUTHORIZATION.as_str()),
            api_key: header(api_key_header),
            ip_address: header("X-Forwarded-For").or_else(|| header("X-Real-IP")),
            user_agent: header(http::header::USER_AGENT.as_str()),
        }
    }
}

/// MCP server that handles protocol requests and delegates to tool handlers.
#[derive(Clone)]
pub struct McpServer {
    tool_registry: Arc<ToolRegistry>,
    /// Caller for this session. Set at construction (stdio) or during
    /// initialize() (HTTP).
    caller: Arc<RwLock<Option<CallerContext>>>,
    /// Optional auth extractor for HTTP mode.
    auth_extractor: Option<Arc<AuthExtractor>>,
}

impl McpServer {
    /// Create a server for a trusted local transport (stdio). Every call
    /// runs as the local operator.
    pub fn new(tool_registry: Arc<ToolRegistry>) -> Self {
        Self::new_with_caller(tool_registry, CallerContext::local_operator())
    }

    /// Create a server whose session caller is already known.
    pub fn new_with_caller(tool_registry: Arc<ToolRegistry>, caller: CallerContext) -> Self {
        Self {
            tool_registry,
            caller: Arc::new(RwLock::new(Some(caller))),
            auth_extractor: None,
        }
    }

    /// Create a new MCP server with auth extractor for HTTP mode.
    ///
    /// The auth extractor will be called during initialize() to extract
    /// the caller from HTTP request headers.
    pub fn new_with_auth(
        tool_registry: Arc<ToolRegistry>,
        auth_extractor: Arc<AuthExtractor>,
    ) -> Self {
        Self {
            tool_registry,
            caller: Arc::new(RwLock::new(None)),
            auth_extractor: Some(auth_extractor),
        }
    }

    /// Get a clone of the current session caller.
    pub async fn caller(&self) -> Option<CallerContext> {
        self.caller.read().await.clone()
    }

    /// Get the tool registry.
    pub fn tool_registry(&self) -> &Arc<ToolRegistry> {
        &self.tool_registry
    }
}

impl ServerHandler for McpServer {
    fn ping(
        &self,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<(), McpError>> + Send + '_ {
        std::future::ready(Ok(()))
    }

    fn initialize(
        &self,
        _request: InitializeRequestParams,
        context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<InitializeResult, McpError>> + Send + '_ {
        let caller_storage = self.caller.clone();
        let auth_extractor = self.auth_extractor.clone();
        let info = self.get_info();

        // rmcp stores http::request::Parts in extensions for HTTP transport
        let extensions = context.extensions.clone();

        async move {
            if let Some(extractor) = auth_extractor {
                let credentials = extensions
                    .get::<HttpParts>()
                    .map(|parts| {
                        RequestCredentials::from_headers(
                            &parts.headers,
                            &extractor.config().api_key_header,
                        )
                    })
                    .unwrap_or_default();

                match extractor
                    .extract_user(
                        credentials.authorization.as_deref(),
                        credentials.api_key.as_deref(),
                        credentials.ip_address,
                        credentials.user_agent,
                    )
                    .await
                {
                    Ok(ctx) => {
                        tracing::info!(
                            caller = %ctx.display(),
                            provider = %ctx.provider().as_str(),
                            "Caller authenticated for MCP session"
                        );
                        *caller_storage.write().await = Some(ctx);
                    }
                    Err(e) => {
                        tracing::warn!("MCP session rejected: {}", e);
                        return Err(auth_error(&e));
                    }
                }
            }

            Ok(info)
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let result = ListToolsResult {
            tools: self.tool_registry.list_tools(),
            next_cursor: None,
            ..Default::default()
        };
        std::future::ready(Ok(result))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        let tool_name = request.name.to_string();
        let args = request.arguments.unwrap_or_default();
        let registry = self.tool_registry.clone();
        let caller_storage = self.caller.clone();

        async move {
            let caller = caller_storage.read().await.clone().ok_or_else(|| {
                McpError::new(UNAUTHORIZED, "Session is not authenticated".to_string(), None)
            })?;

            tracing::debug!(tool = %tool_name, caller = %caller.display(), "Calling tool");
            registry
                .call_tool(&tool_name, args, &ToolContext::new(caller))
                .await
        }
    }

    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Read-only roster service for a learning-management platform. \
                 Use colab.list_enrolled_users to list the users enrolled in a course \
                 (name, email, CPF, username, role) and colab.count_enrolled_users to count them, \
                 optionally filtered by role short-name."
                    .to_string(),
            ),
        }
    }
}

/// Start the enrollment tools as an MCP Streamable HTTP server.
///
/// This exposes the MCP endpoint at `/mcp` on the given bind address,
/// e.g. `127.0.0.1:3942` or `0.0.0.0:3942`. Each session authenticates
/// during initialize().
pub async fn start_mcp_http(
    tool_registry: Arc<ToolRegistry>,
    auth_extractor: Arc<AuthExtractor>,
    bind: &str,
) -> Result<()> {
    let service = StreamableHttpService::new(
        {
            let tool_registry = tool_registry.clone();
            let auth_extractor = auth_extractor.clone();
            move || {
                Ok(McpServer::new_with_auth(
                    tool_registry.clone(),
                    auth_extractor.clone(),
                ))
            }
        },
        LocalSessionManager::default().into(),
        Default::default(),
    );

    let router = Router::new().nest_service("/mcp", service);
    let listener = tokio::net::TcpListener::bind(bind).await?;

    tracing::info!(
        anonymous = auth_extractor.config().allow_anonymous,
        "MCP HTTP server listening on http://{}",
        bind
    );

    axum::serve(listener, router).await?;

    Ok(())
}
