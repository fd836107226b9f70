//! The enrollment query service: list and count users enrolled in a course.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::{AuthorizationChecker, CallerContext};
use crate::enrollment::error::ServiceError;
use crate::enrollment::format::{FullnameFormat, digits_only};
use crate::enrollment::model::{CourseContext, EnrolledUser, EnrollmentQuery};
use crate::enrollment::store::{EnrollmentStore, group_by_key};
use crate::types::{Capability, CourseId, UserId};

/// Tunables of the enrollment service.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Short-name of the tax-id profile field whose values fill `cpf`.
    pub profile_field: String,
    /// Capability a caller needs to read a course's enrollments.
    pub required_capability: Capability,
    /// How first and last names combine into `full_name`.
    pub fullname_format: FullnameFormat,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            profile_field: "CPF".to_string(),
            required_capability: Capability::new("course:view"),
            fullname_format: FullnameFormat::default(),
        }
    }
}

/// Stateless query service over an [`EnrollmentStore`].
///
/// Each call re-queries the store; nothing is cached between calls.
pub struct EnrollmentService {
    store: Arc<dyn EnrollmentStore>,
    authorizer: Arc<dyn AuthorizationChecker>,
    settings: ServiceSettings,
}

impl EnrollmentService {
    pub fn new(
        store: Arc<dyn EnrollmentStore>,
        authorizer: Arc<dyn AuthorizationChecker>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            store,
            authorizer,
            settings,
        }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// List the enrolled, non-deleted users of a course.
    ///
    /// Without a role filter each record carries the first role the store
    /// returned for that user. The store gives no ordering guarantee among a
    /// user's roles, so which role is reported for a user holding several is
    /// arbitrary (stable only for a given backend's iteration order).
    pub async fn list_enrolled_users(
        &self,
        caller: &CallerContext,
        query: &EnrollmentQuery,
    ) -> Result<Vec<EnrolledUser>, ServiceError> {
        let course = self.resolve_course(caller, query.course_id).await?;

        let users = self
            .store
            .enrolled_users(query.course_id)
            .await
            .map_err(ServiceError::store)?;
        if users.is_empty() {
            debug!(course_id = %query.course_id, "Course has no enrolled users");
            return Ok(Vec::new());
        }

        let user_ids: Vec<UserId> = users.iter().map(|u| u.id).collect();

        let assignments = self
            .store
            .role_assignments(course.context_id, &user_ids)
            .await
            .map_err(ServiceError::store)?;
        let roles = group_by_key(assignments.into_iter().map(|row| (row.user_id, row.payload)));

        let tax_ids = self.profile_values(&user_ids).await?;

        let filter = query.role_filter();
        let format = &self.settings.fullname_format;
        let mut records = Vec::with_capacity(users.len());

        for user in users {
            let user_roles = roles.get(&user.id).map(Vec::as_slice).unwrap_or_default();

            let role = match filter {
                Some(wanted) => {
                    if !user_roles.iter().any(|r| r == wanted) {
                        continue;
                    }
                    wanted.to_string()
                }
                None => user_roles.first().cloned().unwrap_or_default(),
            };

            records.push(EnrolledUser {
                full_name: format.format(&user.firstname, &user.lastname),
                email: user.email,
                cpf: tax_ids.get(&user.id).cloned().unwrap_or_default(),
                username: user.username,
                role,
            });
        }

        info!(
            course_id = %query.course_id,
            role = filter.unwrap_or(""),
            returned = records.len(),
            "Listed enrolled users"
        );
        Ok(records)
    }

    /// Count the enrolled, non-deleted users of a course, optionally only
    /// those holding a role in the course context.
    pub async fn count_enrolled_users(
        &self,
        caller: &CallerContext,
        query: &EnrollmentQuery,
    ) -> Result<u64, ServiceError> {
        let course = self.resolve_course(caller, query.course_id).await?;

        let total = match query.role_filter() {
            Some(role) => self
                .store
                .count_enrolled_with_role(query.course_id, course.context_id, role)
                .await
                .map_err(ServiceError::store)?,
            None => self
                .store
                .count_enrolled(query.course_id)
                .await
                .map_err(ServiceError::store)?,
        };

        info!(
            course_id = %query.course_id,
            role = query.role_filter().unwrap_or(""),
            total,
            "Counted enrolled users"
        );
        Ok(total)
    }

    /// Resolve course and context, then check the caller's capability.
    async fn resolve_course(
        &self,
        caller: &CallerContext,
        course_id: CourseId,
    ) -> Result<CourseContext, ServiceError> {
        let course = self
            .store
            .find_course(course_id)
            .await
            .map_err(ServiceError::store)?
            .ok_or_else(|| ServiceError::course_not_found(course_id.get()))?;

        let context_id = self
            .store
            .course_context(course_id)
            .await
            .map_err(ServiceError::store)?
            .ok_or_else(|| ServiceError::context_not_found(course_id.get()))?;

        let context = CourseContext { course, context_id };
        self.authorizer
            .require_capability(caller, &self.settings.required_capability, &context)?;

        Ok(context)
    }

    /// Digits-only tax-id values keyed by user, empty when the field is not
    /// defined in the store.
    async fn profile_values(
        &self,
        user_ids: &[UserId],
    ) -> Result<HashMap<UserId, String>, ServiceError> {
        let Some(field_id) = self
            .store
            .find_profile_field(&self.settings.profile_field)
            .await
            .map_err(ServiceError::store)?
        else {
            debug!(field = %self.settings.profile_field, "Profile field not defined");
            return Ok(HashMap::new());
        };

        let rows = self
            .store
            .profile_field_values(field_id, user_ids)
            .await
            .map_err(ServiceError::store)?;

        Ok(rows
            .into_iter()
            .map(|row| (row.user_id, digits_only(&row.payload)))
            .collect())
    }
}
