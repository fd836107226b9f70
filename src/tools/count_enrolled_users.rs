//! Handler for the `colab.count_enrolled_users` tool.

use std::sync::Arc;

use rmcp::model::JsonObject;
use serde_json::json;

use crate::enrollment::EnrollmentService;
use crate::params::ParameterValidator;
use crate::tools::support::{enrollment_input_schema, json_result, service_error};
use crate::tools::{ToolContext, ToolFuture, ToolHandler};

/// Handler for the `colab.count_enrolled_users` tool.
pub struct CountEnrolledUsersHandler {
    service: Arc<EnrollmentService>,
    validator: Arc<dyn ParameterValidator>,
}

impl CountEnrolledUsersHandler {
    pub fn new(service: Arc<EnrollmentService>, validator: Arc<dyn ParameterValidator>) -> Self {
        Self { service, validator }
    }
}

impl ToolHandler for CountEnrolledUsersHandler {
    fn name(&self) -> &str {
        "colab.count_enrolled_users"
    }

    fn title(&self) -> Option<&str> {
        Some("Count Enrolled Users")
    }

    fn description(&self) -> &str {
        "Count the users enrolled in a course, optionally only those holding `role`. \
         Always equals the length of `colab.list_enrolled_users` for the same arguments."
    }

    fn input_schema(&self) -> JsonObject {
        enrollment_input_schema()
    }

    fn output_schema(&self) -> Option<JsonObject> {
        let mut schema = JsonObject::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert(
            "properties".to_string(),
            json!({ "count": { "type": "integer", "minimum": 0 } }),
        );
        schema.insert("required".to_string(), json!(["count"]));
        Some(schema)
    }

    fn execute<'a>(&'a self, args: JsonObject, ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(async move {
            let query = self.validator.validate(&args).map_err(|e| service_error(&e))?;
            let count = self
                .service
                .count_enrolled_users(&ctx.caller, &query)
                .await
                .map_err(|e| service_error(&e))?;

            Ok(json_result(json!({ "count": count })))
        })
    }
}
