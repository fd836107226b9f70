//! Capability checks applied before enrollment data is read.

use tracing::warn;

use crate::auth::context::CallerContext;
use crate::enrollment::{CourseContext, ServiceError};
use crate::types::Capability;

/// Decides whether a caller may use a capability within a course context.
pub trait AuthorizationChecker: Send + Sync {
    fn require_capability(
        &self,
        caller: &CallerContext,
        capability: &Capability,
        context: &CourseContext,
    ) -> Result<(), ServiceError>;
}

/// Grants access when one of the caller's capabilities covers the required
/// one. Capabilities are not course-scoped.
#[derive(Debug, Clone, Default)]
pub struct CapabilityChecker;

impl AuthorizationChecker for CapabilityChecker {
    fn require_capability(
        &self,
        caller: &CallerContext,
        capability: &Capability,
        context: &CourseContext,
    ) -> Result<(), ServiceError> {
        if caller.has_capability(capability) {
            return Ok(());
        }

        warn!(
            caller = %caller.display(),
            provider = %caller.provider(),
            capability = %capability,
            course_id = %context.course.id,
            context_id = %context.context_id,
            "Capability check failed"
        );
        Err(ServiceError::Authorization {
            capability: capability.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::Course;
    use crate::types::{ContextId, CourseId};

    fn course_context() -> CourseContext {
        CourseContext {
            course: Course {
                id: CourseId::new(10),
                fullname: "Algebra".to_string(),
                shortname: "ALG".to_string(),
            },
            context_id: ContextId::new(110),
        }
    }

    #[test]
    fn test_granted_capability_passes() {
        let caller = CallerContext::anonymous(vec![Capability::new("course:view")]);
        let result = CapabilityChecker.require_capability(
            &caller,
            &Capability::new("course:view"),
            &course_context(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_missing_capability_is_authorization_error() {
        let caller = CallerContext::anonymous(vec![Capability::new("course:update")]);
        let result = CapabilityChecker.require_capability(
            &caller,
            &Capability::new("course:view"),
            &course_context(),
        );
        assert_eq!(
            result,
            Err(ServiceError::Authorization {
                capability: Capability::new("course:view")
            })
        );
    }
}
