//! Roster import from a JSON document.
//!
//! The document mirrors the host platform's tables with plain integer ids,
//! so a dump of the real system can be loaded without remapping keys.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::Db;
use crate::db::schema::COURSE_CONTEXT_LEVEL;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RosterSeed {
    #[serde(default)]
    pub courses: Vec<SeedCourse>,
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub enrol_methods: Vec<SeedEnrolMethod>,
    #[serde(default)]
    pub enrolments: Vec<SeedEnrolment>,
    #[serde(default)]
    pub roles: Vec<SeedRole>,
    #[serde(default)]
    pub role_assignments: Vec<SeedRoleAssignment>,
    #[serde(default)]
    pub profile_fields: Vec<SeedProfileField>,
    #[serde(default)]
    pub profile_data: Vec<SeedProfileData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedCourse {
    pub id: i64,
    pub fullname: String,
    pub shortname: String,
    /// Course-level context id. Courses without one cannot be queried.
    #[serde(default)]
    pub context_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedUser {
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedEnrolMethod {
    pub id: i64,
    pub course_id: i64,
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "manual".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedEnrolment {
    pub user_id: i64,
    pub enrol_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedRole {
    pub id: i64,
    pub shortname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedRoleAssignment {
    pub user_id: i64,
    pub role_id: i64,
    pub context_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedProfileField {
    pub id: i64,
    pub shortname: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedProfileData {
    pub user_id: i64,
    pub field_id: i64,
    pub data: String,
}

/// Counts of records written by an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub courses: usize,
    pub users: usize,
    pub enrolments: usize,
    pub role_assignments: usize,
    pub profile_values: usize,
}

impl RosterSeed {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read roster file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse roster file {}", path.display()))
    }
}

/// Write every record of `seed` into the database.
///
/// Every record is upserted, so importing the same document twice leaves
/// the store unchanged. Enrolments, role assignments and profile values have
/// no host id and are keyed by the ids they link instead.
pub async fn import(db: &Db, seed: &RosterSeed) -> Result<ImportSummary> {
    for course in &seed.courses {
        db.query(
            "UPSERT type::thing('course', $id) CONTENT { fullname: $fullname, shortname: $shortname }",
        )
        .bind(("id", course.id))
        .bind(("fullname", course.fullname.clone()))
        .bind(("shortname", course.shortname.clone()))
        .await?
        .check()?;

        if let Some(context_id) = course.context_id {
            db.query(
                "UPSERT type::thing('context', $id) CONTENT { contextlevel: $level, instanceid: $course_id }",
            )
            .bind(("id", context_id))
            .bind(("level", COURSE_CONTEXT_LEVEL))
            .bind(("course_id", course.id))
            .await?
            .check()?;
        }
    }

    for user in &seed.users {
        db.query(
            r#"
            UPSERT type::thing('user', $id) CONTENT {
                firstname: $firstname,
                lastname: $lastname,
                email: $email,
                username: $username,
                deleted: $deleted
            }
            "#,
        )
        .bind(("id", user.id))
        .bind(("firstname", user.firstname.clone()))
        .bind(("lastname", user.lastname.clone()))
        .bind(("email", user.email.clone()))
        .bind(("username", user.username.clone()))
        .bind(("deleted", user.deleted))
        .await?
        .check()?;
    }

    for method in &seed.enrol_methods {
        db.query(
            "UPSERT type::thing('enrol', $id) CONTENT { course: type::thing('course', $course_id), method: $method }",
        )
        .bind(("id", method.id))
        .bind(("course_id", method.course_id))
        .bind(("method", method.method.clone()))
        .await?
        .check()?;
    }

    for enrolment in &seed.enrolments {
        db.query(
            r#"
            UPSERT type::thing('user_enrolments', [$user_id, $enrol_id]) CONTENT {
                user: type::thing('user', $user_id),
                enrol: type::thing('enrol', $enrol_id)
            }
            "#,
        )
        .bind(("user_id", enrolment.user_id))
        .bind(("enrol_id", enrolment.enrol_id))
        .await?
        .check()?;
    }

    for role in &seed.roles {
        db.query("UPSERT type::thing('role', $id) CONTENT { shortname: $shortname }")
            .bind(("id", role.id))
            .bind(("shortname", role.shortname.clone()))
            .await?
            .check()?;
    }

    for assignment in &seed.role_assignments {
        db.query(
            r#"
            UPSERT type::thing('role_assignments', [$user_id, $role_id, $context_id]) CONTENT {
                user: type::thing('user', $user_id),
                role: type::thing('role', $role_id),
                context: type::thing('context', $context_id)
            }
            "#,
        )
        .bind(("user_id", assignment.user_id))
        .bind(("role_id", assignment.role_id))
        .bind(("context_id", assignment.context_id))
        .await?
        .check()?;
    }

    for field in &seed.profile_fields {
        db.query(
            "UPSERT type::thing('user_info_field', $id) CONTENT { shortname: $shortname, name: $name }",
        )
        .bind(("id", field.id))
        .bind(("shortname", field.shortname.clone()))
        .bind(("name", field.name.clone()))
        .await?
        .check()?;
    }

    for value in &seed.profile_data {
        db.query(
            r#"
            UPSERT type::thing('user_info_data', [$field_id, $user_id]) CONTENT {
                user: type::thing('user', $user_id),
                field: type::thing('user_info_field', $field_id),
                data: $data
            }
            "#,
        )
        .bind(("user_id", value.user_id))
        .bind(("field_id", value.field_id))
        .bind(("data", value.data.clone()))
        .await?
        .check()?;
    }

    let summary = ImportSummary {
        courses: seed.courses.len(),
        users: seed.users.len(),
        enrolments: seed.enrolments.len(),
        role_assignments: seed.role_assignments.len(),
        profile_values: seed.profile_data.len(),
    };
    info!(?summary, "Imported roster");
    Ok(summary)
}
