use serde::{Deserialize, Serialize};
use surrealdb::{RecordId, sql::Datetime};

use crate::enrollment::{Course, EnrolledUserRow, KeyedRow};
use crate::types::{ApiKeyHash, ApiKeyPrefix, CourseId, UserId};

/// Context level the host platform uses for course contexts.
pub const COURSE_CONTEXT_LEVEL: i64 = 50;

/// Row shape of a course lookup (`record::id(id) AS course_id`).
#[derive(Debug, Clone, Deserialize)]
pub struct CourseRow {
    pub course_id: i64,
    pub fullname: String,
    pub shortname: String,
}

impl From<CourseRow> for Course {
    fn from(row: CourseRow) -> Self {
        Self {
            id: CourseId::new(row.course_id),
            fullname: row.fullname,
            shortname: row.shortname,
        }
    }
}

/// Row shape of the enrolled-user fetch.
#[derive(Debug, Clone, Deserialize)]
pub struct UserRow {
    pub user_id: i64,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub username: String,
}

impl From<UserRow> for EnrolledUserRow {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::new(row.user_id),
            firstname: row.firstname,
            lastname: row.lastname,
            email: row.email,
            username: row.username,
        }
    }
}

/// Row shape shared by every batch fetch keyed by user id.
#[derive(Debug, Clone, Deserialize)]
pub struct UserKeyedRow {
    pub user_id: i64,
    pub payload: String,
}

impl From<UserKeyedRow> for KeyedRow {
    fn from(row: UserKeyedRow) -> Self {
        Self {
            user_id: UserId::new(row.user_id),
            payload: row.payload,
        }
    }
}

/// Row shape of `SELECT count() AS total ... GROUP ALL`.
#[derive(Debug, Clone, Deserialize)]
pub struct CountRow {
    pub total: u64,
}

/// Persisted API key record for database-backed authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    /// Database identifier
    pub id: RecordId,
    /// SHA-256 hash of the full API key (never store raw keys)
    pub key_hash: ApiKeyHash,
    /// First part of the key for display/identification (e.g., "cr_abc12345")
    pub key_prefix: ApiKeyPrefix,
    /// Human-readable name for this key
    pub name: Option<String>,
    /// Whether the key is active (can be revoked)
    pub is_active: bool,
    /// Optional expiration time
    pub expires_at: Option<Datetime>,
    /// Capabilities granted to callers presenting this key
    pub scopes: Option<Vec<String>>,
    /// When the key was created
    pub created_at: Option<Datetime>,
    /// Last time the key was used for authentication
    pub last_used_at: Option<Datetime>,
    /// Computed at lookup time: `expires_at` lies in the past
    #[serde(default)]
    pub is_expired: bool,
}

/// Payload for creating a new API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyCreate {
    /// SHA-256 hash of the full API key
    pub key_hash: ApiKeyHash,
    /// First part of the key for display/identification
    pub key_prefix: ApiKeyPrefix,
    /// Human-readable name for this key
    pub name: Option<String>,
    /// Optional expiration time
    pub expires_at: Option<Datetime>,
    /// Capabilities granted to callers presenting this key
    pub scopes: Option<Vec<String>>,
}
