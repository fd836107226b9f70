//! SurrealDB implementation of the enrollment store.
//!
//! Each method issues exactly one SurrealQL statement. Foreign keys are
//! record links, so the joins of the host schema become link traversals
//! (`enrol.course`, `role.shortname`).

use anyhow::Result;
use surrealdb::RecordId;
use tracing::debug;

use crate::db::Db;
use crate::db::schema::{COURSE_CONTEXT_LEVEL, CountRow, CourseRow, UserKeyedRow, UserRow};
use crate::enrollment::{Course, EnrolledUserRow, EnrollmentStore, KeyedRow, StoreFuture};
use crate::types::{ContextId, CourseId, FieldId, UserId};

const FIND_COURSE: &str = r#"
    SELECT record::id(id) AS course_id, fullname, shortname FROM $course
"#;

const COURSE_CONTEXT: &str = r#"
    SELECT VALUE record::id(id) FROM context
    WHERE contextlevel = $level AND instanceid = $course_id
    LIMIT 1
"#;

const ENROLLED_USERS: &str = r#"
    SELECT record::id(id) AS user_id, firstname, lastname, email, username
    FROM array::distinct((
        SELECT VALUE user FROM user_enrolments WHERE enrol.course = $course
    ))
    WHERE deleted = false
"#;

const ROLE_ASSIGNMENTS: &str = r#"
    SELECT record::id(user) AS user_id, role.shortname AS payload
    FROM role_assignments
    WHERE context = $scope AND user IN $users AND role.shortname != NONE
"#;

const FIND_PROFILE_FIELD: &str = r#"
    SELECT VALUE record::id(id) FROM user_info_field
    WHERE shortname = $shortname
    LIMIT 1
"#;

const PROFILE_FIELD_VALUES: &str = r#"
    SELECT record::id(user) AS user_id, data AS payload
    FROM user_info_data
    WHERE field = $scope AND user IN $users
"#;

const COUNT_ENROLLED: &str = r#"
    SELECT count() AS total
    FROM array::distinct((
        SELECT VALUE user FROM user_enrolments WHERE enrol.course = $course
    ))
    WHERE deleted = false
    GROUP ALL
"#;

const COUNT_ENROLLED_WITH_ROLE: &str = r#"
    SELECT count() AS total
    FROM array::distinct((
        SELECT VALUE user FROM user_enrolments WHERE enrol.course = $course
    ))
    WHERE deleted = false
      AND id IN (
          SELECT VALUE user FROM role_assignments
          WHERE context = $context AND role.shortname = $role
      )
    GROUP ALL
"#;

fn course_record(course_id: CourseId) -> RecordId {
    RecordId::from_table_key("course", course_id.get())
}

fn context_record(context_id: ContextId) -> RecordId {
    RecordId::from_table_key("context", context_id.get())
}

fn user_records(user_ids: &[UserId]) -> Vec<RecordId> {
    user_ids
        .iter()
        .map(|id| RecordId::from_table_key("user", id.get()))
        .collect()
}

/// Enrollment store backed by a SurrealDB connection.
#[derive(Clone)]
pub struct SurrealEnrollmentStore {
    db: Db,
}

impl SurrealEnrollmentStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Fetch `(user_id, payload)` rows for a set of users with one query.
    ///
    /// `query` must select `user_id` and `payload`, and filter on `$scope`
    /// and `user IN $users`.
    async fn fetch_keyed(
        &self,
        query: &'static str,
        scope: RecordId,
        user_ids: &[UserId],
    ) -> Result<Vec<KeyedRow>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut res = self
            .db
            .query(query)
            .bind(("scope", scope))
            .bind(("users", user_records(user_ids)))
            .await?;

        let rows: Vec<UserKeyedRow> = res.take(0)?;
        debug!(users = user_ids.len(), rows = rows.len(), "Fetched keyed rows");
        Ok(rows.into_iter().map(KeyedRow::from).collect())
    }

    async fn count(&self, query: &'static str, bindings: CountBindings) -> Result<u64> {
        let mut q = self.db.query(query).bind(("course", bindings.course));
        if let Some((context, role)) = bindings.role {
            q = q.bind(("context", context)).bind(("role", role));
        }

        let mut res = q.await?;
        let rows: Vec<CountRow> = res.take(0)?;
        // GROUP ALL yields no row at all when nothing matched
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}

struct CountBindings {
    course: RecordId,
    role: Option<(RecordId, String)>,
}

impl EnrollmentStore for SurrealEnrollmentStore {
    fn find_course(&self, course_id: CourseId) -> StoreFuture<'_, Option<Course>> {
        Box::pin(async move {
            let mut res = self
                .db
                .query(FIND_COURSE)
                .bind(("course", course_record(course_id)))
                .await?;
            let rows: Vec<CourseRow> = res.take(0)?;
            Ok(rows.into_iter().next().map(Course::from))
        })
    }

    fn course_context(&self, course_id: CourseId) -> StoreFuture<'_, Option<ContextId>> {
        Box::pin(async move {
            let mut res = self
                .db
                .query(COURSE_CONTEXT)
                .bind(("level", COURSE_CONTEXT_LEVEL))
                .bind(("course_id", course_id.get()))
                .await?;
            let ids: Vec<i64> = res.take(0)?;
            Ok(ids.into_iter().next().map(ContextId::new))
        })
    }

    fn enrolled_users(&self, course_id: CourseId) -> StoreFuture<'_, Vec<EnrolledUserRow>> {
        Box::pin(async move {
            let mut res = self
                .db
                .query(ENROLLED_USERS)
                .bind(("course", course_record(course_id)))
                .await?;
            let rows: Vec<UserRow> = res.take(0)?;
            Ok(rows.into_iter().map(EnrolledUserRow::from).collect())
        })
    }

    fn role_assignments<'a>(
        &'a self,
        context_id: ContextId,
        user_ids: &'a [UserId],
    ) -> StoreFuture<'a, Vec<KeyedRow>> {
        Box::pin(self.fetch_keyed(ROLE_ASSIGNMENTS, context_record(context_id), user_ids))
    }

    fn find_profile_field<'a>(&'a self, shortname: &'a str) -> StoreFuture<'a, Option<FieldId>> {
        Box::pin(async move {
            let mut res = self
                .db
                .query(FIND_PROFILE_FIELD)
                .bind(("shortname", shortname.to_string()))
                .await?;
            let ids: Vec<i64> = res.take(0)?;
            Ok(ids.into_iter().next().map(FieldId::new))
        })
    }

    fn profile_field_values<'a>(
        &'a self,
        field_id: FieldId,
        user_ids: &'a [UserId],
    ) -> StoreFuture<'a, Vec<KeyedRow>> {
        let field = RecordId::from_table_key("user_info_field", field_id.get());
        Box::pin(self.fetch_keyed(PROFILE_FIELD_VALUES, field, user_ids))
    }

    fn count_enrolled(&self, course_id: CourseId) -> StoreFuture<'_, u64> {
        Box::pin(self.count(
            COUNT_ENROLLED,
            CountBindings {
                course: course_record(course_id),
                role: None,
            },
        ))
    }

    fn count_enrolled_with_role<'a>(
        &'a self,
        course_id: CourseId,
        context_id: ContextId,
        role: &'a str,
    ) -> StoreFuture<'a, u64> {
        Box::pin(self.count(
            COUNT_ENROLLED_WITH_ROLE,
            CountBindings {
                course: course_record(course_id),
                role: Some((context_record(context_id), role.to_string())),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CallerContext, CapabilityChecker};
    use crate::db::seed::{self, RosterSeed};
    use crate::db::{DatabaseConfig, create_connection, ensure_schema};
    use crate::enrollment::{EnrollmentQuery, EnrollmentService, ServiceError, ServiceSettings};
    use std::sync::Arc;

    async fn setup_test_db() -> Db {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };
        let db = create_connection(config).await.unwrap();
        ensure_schema(&db).await.unwrap();
        db
    }

    /// Course 10 (context 110): ana = [student], bruno = [student, ta],
    /// carla = []. Also a deleted user, a user enrolled elsewhere, a double
    /// enrolment and a role held in another course's context.
    fn course_ten_seed() -> RosterSeed {
        serde_json::from_value(serde_json::json!({
            "courses": [
                { "id": 10, "fullname": "Algebra I", "shortname": "ALG1", "context_id": 110 },
                { "id": 11, "fullname": "Geometry", "shortname": "GEO", "context_id": 111 },
                { "id": 12, "fullname": "Empty", "shortname": "EMPTY", "context_id": 112 }
            ],
            "users": [
                { "id": 1, "firstname": "Ana", "lastname": "Lima", "email": "ana@example.com", "username": "ana" },
                { "id": 2, "firstname": "Bruno", "lastname": "Costa", "email": "bruno@example.com", "username": "bruno" },
                { "id": 3, "firstname": "Carla", "lastname": "Dias", "email": "carla@example.com", "username": "carla" },
                { "id": 4, "firstname": "Davi", "lastname": "Reis", "email": "davi@example.com", "username": "davi", "deleted": true },
                { "id": 5, "firstname": "Eva", "lastname": "Melo", "email": "eva@example.com", "username": "eva" }
            ],
            "enrol_methods": [
                { "id": 1, "course_id": 10, "method": "manual" },
                { "id": 2, "course_id": 10, "method": "self" },
                { "id": 3, "course_id": 11, "method": "manual" }
            ],
            "enrolments": [
                { "user_id": 1, "enrol_id": 1 },
                { "user_id": 2, "enrol_id": 1 },
                { "user_id": 2, "enrol_id": 2 },
                { "user_id": 3, "enrol_id": 2 },
                { "user_id": 4, "enrol_id": 1 },
                { "user_id": 5, "enrol_id": 3 }
            ],
            "roles": [
                { "id": 3, "shortname": "editingteacher" },
                { "id": 4, "shortname": "ta" },
                { "id": 5, "shortname": "student" }
            ],
            "role_assignments": [
                { "user_id": 1, "role_id": 5, "context_id": 110 },
                { "user_id": 2, "role_id": 5, "context_id": 110 },
                { "user_id": 2, "role_id": 4, "context_id": 110 },
                { "user_id": 3, "role_id": 3, "context_id": 111 },
                { "user_id": 4, "role_id": 4, "context_id": 110 },
                { "user_id": 5, "role_id": 5, "context_id": 111 }
            ],
            "profile_fields": [
                { "id": 1, "shortname": "CPF", "name": "CPF" }
            ],
            "profile_data": [
                { "user_id": 1, "field_id": 1, "data": "123.456.789-00" },
                { "user_id": 2, "field_id": 1, "data": "987 654 321 99" }
            ]
        }))
        .unwrap()
    }

    async fn seeded_service(seed_data: RosterSeed) -> EnrollmentService {
        let db = setup_test_db().await;
        seed::import(&db, &seed_data).await.unwrap();
        EnrollmentService::new(
            Arc::new(SurrealEnrollmentStore::new(db)),
            Arc::new(CapabilityChecker),
            ServiceSettings::default(),
        )
    }

    fn operator() -> CallerContext {
        CallerContext::local_operator()
    }

    fn sorted_usernames(users: &[crate::enrollment::EnrolledUser]) -> Vec<String> {
        let mut names: Vec<String> = users.iter().map(|u| u.username.clone()).collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_find_course_and_context() {
        let db = setup_test_db().await;
        seed::import(&db, &course_ten_seed()).await.unwrap();
        let store = SurrealEnrollmentStore::new(db);

        let course = store.find_course(CourseId::new(10)).await.unwrap().unwrap();
        assert_eq!(course.shortname, "ALG1");
        assert!(store.find_course(CourseId::new(99)).await.unwrap().is_none());

        let context = store.course_context(CourseId::new(10)).await.unwrap();
        assert_eq!(context, Some(ContextId::new(110)));
    }

    #[tokio::test]
    async fn test_enrolled_users_excludes_deleted_and_deduplicates() {
        let db = setup_test_db().await;
        seed::import(&db, &course_ten_seed()).await.unwrap();
        let store = SurrealEnrollmentStore::new(db);

        let users = store.enrolled_users(CourseId::new(10)).await.unwrap();
        let mut ids: Vec<i64> = users.iter().map(|u| u.id.get()).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_counts_follow_enrolment_links() {
        let db = setup_test_db().await;
        seed::import(&db, &course_ten_seed()).await.unwrap();
        let store = SurrealEnrollmentStore::new(db);

        for (course, expected) in [(10, 3), (11, 1), (12, 0)] {
            let course = CourseId::new(course);
            let listed = store.enrolled_users(course).await.unwrap();
            let counted = store.count_enrolled(course).await.unwrap();
            assert_eq!(listed.len(), expected);
            assert_eq!(counted, expected as u64);
        }

        // davi holds ta in course 10 but is deleted
        let tas = store
            .count_enrolled_with_role(CourseId::new(10), ContextId::new(110), "ta")
            .await
            .unwrap();
        assert_eq!(tas, 1);
    }

    #[tokio::test]
    async fn test_keyed_fetch_with_no_users_is_empty() {
        let db = setup_test_db().await;
        let store = SurrealEnrollmentStore::new(db);

        let rows = store
            .role_assignments(ContextId::new(110), &[])
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_list_course_ten_without_filter() {
        let service = seeded_service(course_ten_seed()).await;
        let users = service
            .list_enrolled_users(&operator(), &EnrollmentQuery::course(10))
            .await
            .unwrap();

        assert_eq!(sorted_usernames(&users), vec!["ana", "bruno", "carla"]);

        let ana = users.iter().find(|u| u.username == "ana").unwrap();
        assert_eq!(ana.full_name, "Ana Lima");
        assert_eq!(ana.email, "ana@example.com");
        assert_eq!(ana.cpf, "12345678900");
        assert_eq!(ana.role, "student");

        let bruno = users.iter().find(|u| u.username == "bruno").unwrap();
        assert!(["student", "ta"].contains(&bruno.role.as_str()));
        assert_eq!(bruno.cpf, "98765432199");

        // carla's only role is in another course's context
        let carla = users.iter().find(|u| u.username == "carla").unwrap();
        assert_eq!(carla.role, "");
        assert_eq!(carla.cpf, "");
    }

    #[tokio::test]
    async fn test_list_and_count_with_role_filter() {
        let service = seeded_service(course_ten_seed()).await;

        let tas = service
            .list_enrolled_users(&operator(), &EnrollmentQuery::new(10, Some("ta")))
            .await
            .unwrap();
        assert_eq!(sorted_usernames(&tas), vec!["bruno"]);
        assert_eq!(tas[0].role, "ta");

        let ta_count = service
            .count_enrolled_users(&operator(), &EnrollmentQuery::new(10, Some("ta")))
            .await
            .unwrap();
        assert_eq!(ta_count, 1);

        let students = service
            .count_enrolled_users(&operator(), &EnrollmentQuery::new(10, Some("student")))
            .await
            .unwrap();
        assert_eq!(students, 2);

        let total = service
            .count_enrolled_users(&operator(), &EnrollmentQuery::course(10))
            .await
            .unwrap();
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn test_count_equals_list_length() {
        let service = seeded_service(course_ten_seed()).await;

        for role in [None, Some("student"), Some("ta"), Some("editingteacher"), Some("")] {
            let query = EnrollmentQuery::new(10, role);
            let listed = service.list_enrolled_users(&operator(), &query).await.unwrap();
            let counted = service.count_enrolled_users(&operator(), &query).await.unwrap();
            assert_eq!(listed.len() as u64, counted, "role filter {:?}", role);
        }
    }

    #[tokio::test]
    async fn test_empty_course() {
        let service = seeded_service(course_ten_seed()).await;

        let users = service
            .list_enrolled_users(&operator(), &EnrollmentQuery::course(12))
            .await
            .unwrap();
        assert!(users.is_empty());

        let total = service
            .count_enrolled_users(&operator(), &EnrollmentQuery::course(12))
            .await
            .unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_unknown_course_is_not_found() {
        let service = seeded_service(course_ten_seed()).await;

        let result = service
            .list_enrolled_users(&operator(), &EnrollmentQuery::course(404))
            .await;
        assert_eq!(result, Err(ServiceError::course_not_found(404)));
    }

    #[tokio::test]
    async fn test_without_cpf_field_every_cpf_is_empty() {
        let mut seed_data = course_ten_seed();
        seed_data.profile_fields.clear();
        seed_data.profile_data.clear();
        let service = seeded_service(seed_data).await;

        let users = service
            .list_enrolled_users(&operator(), &EnrollmentQuery::course(10))
            .await
            .unwrap();
        assert_eq!(users.len(), 3);
        assert!(users.iter().all(|u| u.cpf.is_empty()));
    }
}
