//! Records exchanged between the enrollment service, its store and callers.

use serde::{Deserialize, Serialize};

use crate::types::{ContextId, CourseId, RoleShortName, UserId};

/// A course as resolved from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub fullname: String,
    pub shortname: String,
}

/// A resolved course together with the context that scopes its role
/// assignments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseContext {
    pub course: Course,
    pub context_id: ContextId,
}

/// A non-deleted user with at least one enrollment in the course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrolledUserRow {
    pub id: UserId,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub username: String,
}

/// A row returned by a batch fetch keyed by user id: one role short-name or
/// one profile value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyedRow {
    pub user_id: UserId,
    pub payload: String,
}

/// Record emitted by `list_enrolled_users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrolledUser {
    pub full_name: String,
    pub email: String,
    /// Digits-only value of the tax-id profile field, or empty.
    pub cpf: String,
    pub username: String,
    /// The filter role when filtering, otherwise the first role the store
    /// returned for this user (empty when the user holds none).
    pub role: String,
}

/// Validated input of both enrollment operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentQuery {
    pub course_id: CourseId,
    pub role: Option<RoleShortName>,
}

impl EnrollmentQuery {
    /// Build a query; an empty role means "no filter".
    pub fn new(course_id: i64, role: Option<&str>) -> Self {
        Self {
            course_id: CourseId::new(course_id),
            role: role.filter(|r| !r.is_empty()).map(RoleShortName::new),
        }
    }

    /// Query without a role filter.
    pub fn course(course_id: i64) -> Self {
        Self::new(course_id, None)
    }

    /// The role filter, if any.
    pub fn role_filter(&self) -> Option<&str> {
        self.role.as_ref().map(|r| r.as_str())
    }
}
