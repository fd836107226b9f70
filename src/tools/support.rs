//! Pieces shared by the enrollment tools: the input schema, result
//! construction and error-code mapping.

use rmcp::ErrorData as McpError;
use rmcp::model::{CallToolResult, Content, ErrorCode, JsonObject};
use serde_json::{Value, json};

use crate::auth::AuthError;
use crate::enrollment::ServiceError;

/// Caller is unauthenticated or lacks a capability.
pub const UNAUTHORIZED: ErrorCode = ErrorCode(-32001);
/// Referenced course (or its context) does not exist.
pub const NOT_FOUND: ErrorCode = ErrorCode(-32002);

/// Input schema shared by both enrollment tools.
pub fn enrollment_input_schema() -> JsonObject {
    let mut schema = JsonObject::new();
    schema.insert("type".to_string(), json!("object"));

    let mut properties = serde_json::Map::new();
    properties.insert(
        "course_id".to_string(),
        json!({
            "type": ["integer", "string"],
            "description": "Host identifier of the course. Integer-valued strings are accepted."
        }),
    );
    properties.insert(
        "role".to_string(),
        json!({
            "type": ["string", "null"],
            "description": "Role short-name to filter by, e.g. \"student\". Case-sensitive. Empty or omitted means all enrolled users.",
            "default": ""
        }),
    );

    schema.insert("properties".to_string(), json!(properties));
    schema.insert("required".to_string(), json!(["course_id"]));
    schema.insert("additionalProperties".to_string(), json!(false));
    schema
}

/// Successful result carrying `payload` both as text and as structured
/// content.
pub fn json_result(payload: Value) -> CallToolResult {
    let text = serde_json::to_string(&payload)
        .unwrap_or_else(|_| "internal serialization error".to_string());
    CallToolResult {
        content: vec![Content::text(text)],
        structured_content: Some(payload),
        is_error: Some(false),
        meta: None,
    }
}

/// Map a service failure onto a JSON-RPC error.
pub fn service_error(err: &ServiceError) -> McpError {
    let data = Some(json!({ "kind": err.kind() }));
    match err {
        ServiceError::Validation(_) => McpError::invalid_params(err.to_string(), data),
        ServiceError::NotFound { .. } => McpError::new(NOT_FOUND, err.to_string(), data),
        ServiceError::Authorization { .. } => McpError::new(UNAUTHORIZED, err.to_string(), data),
        ServiceError::Store(_) => McpError::internal_error(err.to_string(), data),
    }
}

/// Map an authentication failure onto a JSON-RPC error.
pub fn auth_error(err: &AuthError) -> McpError {
    match err {
        AuthError::DatabaseError(msg) => {
            McpError::internal_error(format!("Authentication failed: {}", msg), None)
        }
        other => McpError::new(UNAUTHORIZED, other.to_string(), None),
    }
}
