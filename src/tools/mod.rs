//! Tool handler registry for managing MCP tool implementations.
//!
//! This module provides a simple way to register and invoke tool handlers,
//! making it easy to add new tools without modifying the core `ServerHandler`
//! implementation.

mod registry;
pub mod support;

pub use registry::{ToolContext, ToolFuture, ToolHandler, ToolRegistry};

// Tool handler implementations
mod count_enrolled_users;
mod list_enrolled_users;

pub use count_enrolled_users::CountEnrolledUsersHandler;
pub use list_enrolled_users::ListEnrolledUsersHandler;

use std::sync::Arc;

use crate::enrollment::EnrollmentService;
use crate::params::EnrollmentParams;

/// Registry holding both enrollment tools.
pub fn enrollment_tools(service: Arc<EnrollmentService>) -> ToolRegistry {
    let validator = Arc::new(EnrollmentParams);
    ToolRegistry::new()
        .register_handler(ListEnrolledUsersHandler::new(
            service.clone(),
            validator.clone(),
        ))
        .register_handler(CountEnrolledUsersHandler::new(service, validator))
}
