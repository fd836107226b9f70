use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;

pub type Db = Surreal<Any>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: env::var("SURREALDB_URL")
                .unwrap_or_else(|_| "memory".to_string()),
            namespace: env::var("SURREALDB_NAMESPACE")
                .unwrap_or_else(|_| "colab".to_string()),
            database: env::var("SURREALDB_DATABASE")
                .unwrap_or_else(|_| "roster".to_string()),
            username: env::var("SURREALDB_USERNAME").ok(),
            password: env::var("SURREALDB_PASSWORD").ok(),
        }
    }
}

pub async fn create_connection(config: DatabaseConfig) -> Result<Db> {
    let db = surrealdb::engine::any::connect(config.url).await?;

    // Sign in if credentials are provided
    if let (Some(username), Some(password)) = (config.username, config.password) {
        db.signin(Root {
            username: &username,
            password: &password,
        })
        .await?;
    }

    db.use_ns(config.namespace).use_db(config.database).await?;

    Ok(db)
}

/// Define the enrollment tables (named after the host platform's schema)
/// and the API key table. Safe to run repeatedly.
pub async fn ensure_schema(db: &Db) -> Result<()> {
    let schema_queries = vec![
        "DEFINE TABLE IF NOT EXISTS course SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS fullname ON TABLE course TYPE string;
         DEFINE FIELD IF NOT EXISTS shortname ON TABLE course TYPE string;",

        // One context per course (contextlevel 50); role assignments hang off it
        "DEFINE TABLE IF NOT EXISTS context SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS contextlevel ON TABLE context TYPE int;
         DEFINE FIELD IF NOT EXISTS instanceid ON TABLE context TYPE int;",

        "DEFINE TABLE IF NOT EXISTS user SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS firstname ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS lastname ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS email ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS username ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS deleted ON TABLE user TYPE bool DEFAULT false;",

        // Enrollment methods (manual, self, cohort, ...)
        "DEFINE TABLE IF NOT EXISTS enrol SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS course ON TABLE enrol TYPE record<course>;
         DEFINE FIELD IF NOT EXISTS method ON TABLE enrol TYPE string DEFAULT 'manual';",

        "DEFINE TABLE IF NOT EXISTS user_enrolments SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS user ON TABLE user_enrolments TYPE record<user>;
         DEFINE FIELD IF NOT EXISTS enrol ON TABLE user_enrolments TYPE record<enrol>;",

        "DEFINE TABLE IF NOT EXISTS role SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS shortname ON TABLE role TYPE string;",

        "DEFINE TABLE IF NOT EXISTS role_assignments SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS user ON TABLE role_assignments TYPE record<user>;
         DEFINE FIELD IF NOT EXISTS role ON TABLE role_assignments TYPE record<role>;
         DEFINE FIELD IF NOT EXISTS context ON TABLE role_assignments TYPE record<context>;",

        // Custom profile fields and their per-user values
        "DEFINE TABLE IF NOT EXISTS user_info_field SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS shortname ON TABLE user_info_field TYPE string;
         DEFINE FIELD IF NOT EXISTS name ON TABLE user_info_field TYPE string;",

        "DEFINE TABLE IF NOT EXISTS user_info_data SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS user ON TABLE user_info_data TYPE record<user>;
         DEFINE FIELD IF NOT EXISTS field ON TABLE user_info_data TYPE record<user_info_field>;
         DEFINE FIELD IF NOT EXISTS data ON TABLE user_info_data TYPE string;",

        // Caller API keys (hashed)
        "DEFINE TABLE IF NOT EXISTS api_key SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS key_hash ON TABLE api_key TYPE string;
         DEFINE FIELD IF NOT EXISTS key_prefix ON TABLE api_key TYPE string;
         DEFINE FIELD IF NOT EXISTS name ON TABLE api_key TYPE option<string>;
         DEFINE FIELD IF NOT EXISTS is_active ON TABLE api_key TYPE bool DEFAULT true;
         DEFINE FIELD IF NOT EXISTS expires_at ON TABLE api_key TYPE option<datetime>;
         DEFINE FIELD IF NOT EXISTS scopes ON TABLE api_key TYPE option<array<string>>;
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE api_key TYPE datetime DEFAULT time::now();
         DEFINE FIELD IF NOT EXISTS last_used_at ON TABLE api_key TYPE option<datetime>;",

        // Indexes for performance
        "DEFINE INDEX IF NOT EXISTS context_instance ON TABLE context COLUMNS contextlevel, instanceid;
         DEFINE INDEX IF NOT EXISTS enrol_course ON TABLE enrol COLUMNS course;
         DEFINE INDEX IF NOT EXISTS user_enrolments_enrol ON TABLE user_enrolments COLUMNS enrol;
         DEFINE INDEX IF NOT EXISTS user_enrolments_user_enrol ON TABLE user_enrolments COLUMNS user, enrol UNIQUE;
         DEFINE INDEX IF NOT EXISTS role_assignments_context_user ON TABLE role_assignments COLUMNS context, user;
         DEFINE INDEX IF NOT EXISTS user_info_field_shortname ON TABLE user_info_field COLUMNS shortname UNIQUE;
         DEFINE INDEX IF NOT EXISTS user_info_data_field_user ON TABLE user_info_data COLUMNS field, user UNIQUE;
         DEFINE INDEX IF NOT EXISTS api_key_hash ON TABLE api_key COLUMNS key_hash UNIQUE;
         DEFINE INDEX IF NOT EXISTS api_key_prefix ON TABLE api_key COLUMNS key_prefix;",
    ];

    for query in schema_queries {
        db.query(query).await?.check()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> DatabaseConfig {
        DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let db = create_connection(memory_config()).await.unwrap();
        ensure_schema(&db).await.unwrap();
        ensure_schema(&db).await.unwrap();
    }

    #[test]
    fn test_default_config_uses_memory_namespace() {
        let config = memory_config();
        assert_eq!(config.url, "memory");
        assert!(!config.namespace.is_empty());
        assert!(!config.database.is_empty());
    }
}
