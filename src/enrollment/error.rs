//! Error taxonomy for enrollment queries.

use std::fmt;

use crate::types::Capability;

/// Errors surfaced by the enrollment query service.
///
/// Any error aborts the call; no partial results are returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// A referenced entity (course or its context) does not exist.
    NotFound {
        /// Entity kind, e.g. "course".
        entity: &'static str,
        /// The identifier that failed to resolve.
        id: i64,
    },
    /// The caller lacks the capability required for the operation.
    Authorization {
        /// Capability that was required.
        capability: Capability,
    },
    /// Malformed input parameters.
    Validation(String),
    /// The backing store failed.
    Store(String),
}

impl ServiceError {
    /// Shorthand for a missing course.
    pub fn course_not_found(id: i64) -> Self {
        Self::NotFound { entity: "course", id }
    }

    /// Shorthand for a course without a course-level context.
    pub fn context_not_found(course_id: i64) -> Self {
        Self::NotFound {
            entity: "course context",
            id: course_id,
        }
    }

    /// Wrap a store failure.
    pub fn store(err: impl fmt::Display) -> Self {
        Self::Store(err.to_string())
    }

    /// Machine-readable error kind used by the RPC surfaces.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Authorization { .. } => "authorization",
            Self::Validation(_) => "validation",
            Self::Store(_) => "store",
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{} not found: {}", entity, id),
            Self::Authorization { capability } => {
                write!(f, "Missing required capability: {}", capability)
            }
            Self::Validation(msg) => write!(f, "Invalid parameter: {}", msg),
            Self::Store(msg) => write!(f, "Store error: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_display() {
        assert_eq!(
            ServiceError::course_not_found(42).to_string(),
            "course not found: 42"
        );
        assert_eq!(
            ServiceError::Authorization {
                capability: Capability::new("course:view")
            }
            .to_string(),
            "Missing required capability: course:view"
        );
        assert_eq!(
            ServiceError::Validation("course_id must be an integer".to_string()).to_string(),
            "Invalid parameter: course_id must be an integer"
        );
    }

    #[test]
    fn test_service_error_kind() {
        assert_eq!(ServiceError::context_not_found(1).kind(), "not_found");
        assert_eq!(ServiceError::store("boom").kind(), "store");
    }
}
