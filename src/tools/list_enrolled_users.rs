//! Handler for the `colab.list_enrolled_users` tool.

use std::sync::Arc;

use rmcp::model::JsonObject;
use serde_json::json;

use crate::enrollment::EnrollmentService;
use crate::params::ParameterValidator;
use crate::tools::support::{enrollment_input_schema, json_result, service_error};
use crate::tools::{ToolContext, ToolFuture, ToolHandler};

/// Handler for the `colab.list_enrolled_users` tool.
pub struct ListEnrolledUsersHandler {
    service: Arc<EnrollmentService>,
    validator: Arc<dyn ParameterValidator>,
}

impl ListEnrolledUsersHandler {
    pub fn new(service: Arc<EnrollmentService>, validator: Arc<dyn ParameterValidator>) -> Self {
        Self { service, validator }
    }

    fn result_schema(&self) -> JsonObject {
        let mut schema = JsonObject::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert(
            "properties".to_string(),
            json!({
                "users": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "full_name": { "type": "string" },
                            "email": { "type": "string" },
                            "cpf": { "type": "string", "description": "Digits only; empty when unknown." },
                            "username": { "type": "string" },
                            "role": { "type": "string", "description": "One role short-name; empty when none." }
                        },
                        "required": ["full_name", "email", "cpf", "username", "role"]
                    }
                }
            }),
        );
        schema.insert("required".to_string(), json!(["users"]));
        schema
    }
}

impl ToolHandler for ListEnrolledUsersHandler {
    fn name(&self) -> &str {
        "colab.list_enrolled_users"
    }

    fn title(&self) -> Option<&str> {
        Some("List Enrolled Users")
    }

    fn description(&self) -> &str {
        "List the users enrolled in a course with their name, email, CPF, username and \
         one role held in the course. Pass `role` to keep only users holding that role."
    }

    fn input_schema(&self) -> JsonObject {
        enrollment_input_schema()
    }

    fn output_schema(&self) -> Option<JsonObject> {
        Some(self.result_schema())
    }

    fn execute<'a>(&'a self, args: JsonObject, ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(async move {
            let query = self.validator.validate(&args).map_err(|e| service_error(&e))?;
            let users = self
                .service
                .list_enrolled_users(&ctx.caller, &query)
                .await
                .map_err(|e| service_error(&e))?;

            Ok(json_result(json!({ "users": users })))
        })
    }
}
