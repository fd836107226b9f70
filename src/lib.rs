// Core modules
mod config;
pub mod db;
pub mod api;
pub mod auth;
pub mod enrollment;
pub mod params;
pub mod types;

// MCP surface
pub mod tools;
pub mod server;

// Re-export key types and functions
pub use auth::{AuthConfig, AuthExtractor, CallerContext, generate_api_key};
pub use config::{ServiceConfig, resolve_config_path};
pub use db::{DatabaseConfig, RosterSeed, SurrealEnrollmentStore, create_connection, ensure_schema};
pub use enrollment::{EnrolledUser, EnrollmentQuery, EnrollmentService, ServiceError};
pub use server::McpServer;
pub use tools::{ToolHandler, ToolRegistry};

use std::sync::Arc;

use auth::CapabilityChecker;
use db::Db;

/// Build the enrollment service over a SurrealDB connection.
pub fn create_service(db: Db, config: &ServiceConfig) -> Arc<EnrollmentService> {
    Arc::new(EnrollmentService::new(
        Arc::new(SurrealEnrollmentStore::new(db)),
        Arc::new(CapabilityChecker),
        config.settings(),
    ))
}

/// Build the registry holding the enrollment tools.
pub fn create_tool_registry(service: Arc<EnrollmentService>) -> Arc<ToolRegistry> {
    Arc::new(tools::enrollment_tools(service))
}

/// Convenience function to create an MCP server for a trusted local
/// transport (stdio).
pub fn create_server(db: Db, config: &ServiceConfig) -> Arc<McpServer> {
    let registry = create_tool_registry(create_service(db, config));
    Arc::new(McpServer::new(registry))
}
