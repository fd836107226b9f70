//! Argument validation for the enrollment operations.
//!
//! Both transports hand raw JSON arguments to a [`ParameterValidator`] so the
//! MCP tools and the REST routes accept exactly the same inputs.

use serde_json::{Map, Value};

use crate::enrollment::{EnrollmentQuery, ServiceError};

/// Turns untyped call arguments into a validated query.
pub trait ParameterValidator: Send + Sync {
    fn validate(&self, args: &Map<String, Value>) -> Result<EnrollmentQuery, ServiceError>;
}

/// Validator for `{ course_id, role? }`.
///
/// - `course_id`: required; a JSON integer or a string holding one
/// - `role`: optional; a string or null, where empty means no filter
///
/// Any other key is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnrollmentParams;

impl EnrollmentParams {
    const KNOWN_KEYS: [&'static str; 2] = ["course_id", "role"];

    fn course_id(value: Option<&Value>) -> Result<i64, ServiceError> {
        match value {
            None | Some(Value::Null) => Err(ServiceError::Validation(
                "course_id is required".to_string(),
            )),
            Some(Value::Number(n)) => n.as_i64().ok_or_else(|| {
                ServiceError::Validation(format!("course_id must be an integer, got {}", n))
            }),
            Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| {
                ServiceError::Validation(format!("course_id must be an integer, got {:?}", s))
            }),
            Some(other) => Err(ServiceError::Validation(format!(
                "course_id must be an integer, got {}",
                type_name(other)
            ))),
        }
    }

    fn role(value: Option<&Value>) -> Result<Option<&str>, ServiceError> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(ServiceError::Validation(format!(
                "role must be a string, got {}",
                type_name(other)
            ))),
        }
    }
}

impl ParameterValidator for EnrollmentParams {
    fn validate(&self, args: &Map<String, Value>) -> Result<EnrollmentQuery, ServiceError> {
        if let Some(unknown) = args
            .keys()
            .find(|k| !Self::KNOWN_KEYS.contains(&k.as_str()))
        {
            return Err(ServiceError::Validation(format!(
                "unknown parameter: {}",
                unknown
            )));
        }

        let course_id = Self::course_id(args.get("course_id"))?;
        let role = Self::role(args.get("role"))?;
        Ok(EnrollmentQuery::new(course_id, role))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
