//! Query contract between the enrollment service and its backing store.
//!
//! Every method maps to a single store round trip. Batch lookups take the
//! full user-id set so that the number of queries per call stays fixed no
//! matter how many users are enrolled.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;

use anyhow::Result;

use crate::enrollment::model::{Course, EnrolledUserRow, KeyedRow};
use crate::types::{ContextId, CourseId, FieldId, UserId};

/// Boxed future returned by store methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Read-only query interface over the host enrollment schema.
pub trait EnrollmentStore: Send + Sync {
    /// Look up a course by id.
    fn find_course(&self, course_id: CourseId) -> StoreFuture<'_, Option<Course>>;

    /// Look up the course-level context of a course.
    fn course_context(&self, course_id: CourseId) -> StoreFuture<'_, Option<ContextId>>;

    /// Non-deleted users with at least one enrollment record in the course,
    /// in store order.
    fn enrolled_users(&self, course_id: CourseId) -> StoreFuture<'_, Vec<EnrolledUserRow>>;

    /// Role short-names assigned in `context_id` to any of `user_ids`.
    fn role_assignments<'a>(
        &'a self,
        context_id: ContextId,
        user_ids: &'a [UserId],
    ) -> StoreFuture<'a, Vec<KeyedRow>>;

    /// Look up a custom profile field definition by short-name.
    fn find_profile_field<'a>(&'a self, shortname: &'a str) -> StoreFuture<'a, Option<FieldId>>;

    /// Raw values of a profile field for any of `user_ids`.
    fn profile_field_values<'a>(
        &'a self,
        field_id: FieldId,
        user_ids: &'a [UserId],
    ) -> StoreFuture<'a, Vec<KeyedRow>>;

    /// Number of distinct non-deleted users enrolled in the course.
    fn count_enrolled(&self, course_id: CourseId) -> StoreFuture<'_, u64>;

    /// Number of distinct non-deleted users enrolled in the course that hold
    /// `role` in `context_id`.
    fn count_enrolled_with_role<'a>(
        &'a self,
        course_id: CourseId,
        context_id: ContextId,
        role: &'a str,
    ) -> StoreFuture<'a, u64>;
}

/// Group keyed rows into a map from key to the values in arrival order.
pub fn group_by_key<K, V, I>(rows: I) -> HashMap<K, Vec<V>>
where
    K: Eq + Hash,
    I: IntoIterator<Item = (K, V)>,
{
    let mut grouped: HashMap<K, Vec<V>> = HashMap::new();
    for (key, value) in rows {
        grouped.entry(key).or_default().push(value);
    }
    grouped
}
