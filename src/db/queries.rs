// API key queries for SurrealDB.
//
// Enrollment reads live in `store.rs`; this file holds the small amount of
// state the service owns itself.

use crate::db::schema::*;
use anyhow::{anyhow, Result};
use surrealdb::{engine::any::Any, RecordId, Surreal};

pub struct QueryBuilder;

impl QueryBuilder {
    /// Create a new API key record.
    pub async fn create_api_key(
        db: &Surreal<Any>,
        data: &ApiKeyCreate,
    ) -> Result<ApiKeyRecord> {
        let mut res = db
            .query(
                r#"
                CREATE api_key SET
                    key_hash = $key_hash,
                    key_prefix = $key_prefix,
                    name = $name,
                    is_active = true,
                    expires_at = $expires_at,
                    scopes = $scopes,
                    created_at = time::now()
                "#,
            )
            .bind(("key_hash", data.key_hash.as_str().to_string()))
            .bind(("key_prefix", data.key_prefix.as_str().to_string()))
            .bind(("name", data.name.clone()))
            .bind(("expires_at", data.expires_at.clone()))
            .bind(("scopes", data.scopes.clone()))
            .await?;

        let created: Option<ApiKeyRecord> = res.take(0)?;
        created.ok_or_else(|| anyhow!("failed to create api key record"))
    }

    /// Look up an API key by the hash of the presented key.
    ///
    /// `is_expired` is computed by the database against its own clock.
    pub async fn find_api_key_by_hash(
        db: &Surreal<Any>,
        key_hash: &str,
    ) -> Result<Option<ApiKeyRecord>> {
        let mut res = db
            .query(
                r#"
                SELECT *, (expires_at != NONE AND expires_at < time::now()) AS is_expired
                FROM api_key
                WHERE key_hash = $key_hash
                LIMIT 1
                "#,
            )
            .bind(("key_hash", key_hash.to_string()))
            .await?;

        let keys: Vec<ApiKeyRecord> = res.take(0)?;
        Ok(keys.into_iter().next())
    }

    /// Record that a key was just used.
    pub async fn update_api_key_last_used(db: &Surreal<Any>, id: &RecordId) -> Result<()> {
        db.query("UPDATE $id SET last_used_at = time::now()")
            .bind(("id", id.clone()))
            .await?
            .check()?;
        Ok(())
    }

    /// All API keys, newest first.
    pub async fn list_api_keys(db: &Surreal<Any>) -> Result<Vec<ApiKeyRecord>> {
        let mut res = db
            .query("SELECT * FROM api_key ORDER BY created_at DESC")
            .await?;
        let keys: Vec<ApiKeyRecord> = res.take(0)?;
        Ok(keys)
    }

    /// API keys that are neither revoked nor expired.
    pub async fn list_active_api_keys(db: &Surreal<Any>) -> Result<Vec<ApiKeyRecord>> {
        let mut res = db
            .query(
                r#"
                SELECT * FROM api_key
                WHERE is_active = true
                  AND (expires_at = NONE OR expires_at >= time::now())
                ORDER BY created_at DESC
                "#,
            )
            .await?;
        let keys: Vec<ApiKeyRecord> = res.take(0)?;
        Ok(keys)
    }

    /// Revoke every key with the given prefix. Returns whether any key
    /// matched.
    pub async fn deactivate_api_key_by_prefix(
        db: &Surreal<Any>,
        key_prefix: &str,
    ) -> Result<bool> {
        let mut res = db
            .query("UPDATE api_key SET is_active = false WHERE key_prefix = $prefix")
            .bind(("prefix", key_prefix.to_string()))
            .await?;
        let updated: Vec<ApiKeyRecord> = res.take(0)?;
        Ok(!updated.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{generate_api_key, hash_api_key};
    use crate::db::{DatabaseConfig, create_connection, ensure_schema};

    async fn setup_test_db() -> crate::db::Db {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };
        let db = create_connection(config).await.unwrap();
        ensure_schema(&db).await.unwrap();
        db
    }

    fn key_create(expires_at: Option<chrono::DateTime<chrono::Utc>>) -> (String, ApiKeyCreate) {
        let (full_key, prefix, key_hash) = generate_api_key();
        let create = ApiKeyCreate {
            key_hash,
            key_prefix: prefix,
            name: Some("reporting".to_string()),
            expires_at: expires_at.map(surrealdb::sql::Datetime::from),
            scopes: Some(vec!["course:view".to_string()]),
        };
        (full_key, create)
    }

    #[tokio::test]
    async fn test_create_and_find_api_key() {
        let db = setup_test_db().await;
        let (full_key, create) = key_create(None);

        let created = QueryBuilder::create_api_key(&db, &create).await.unwrap();
        assert!(created.is_active);

        let found = QueryBuilder::find_api_key_by_hash(&db, hash_api_key(&full_key).as_str())
            .await
            .unwrap()
            .expect("key should be found");
        assert_eq!(found.key_prefix, create.key_prefix);
        assert_eq!(found.scopes, Some(vec!["course:view".to_string()]));
        assert!(!found.is_expired);

        let missing = QueryBuilder::find_api_key_by_hash(&db, "deadbeef").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_expired_key_is_flagged() {
        let db = setup_test_db().await;
        let (full_key, create) =
            key_create(Some(chrono::Utc::now() - chrono::Duration::days(1)));
        QueryBuilder::create_api_key(&db, &create).await.unwrap();

        let found = QueryBuilder::find_api_key_by_hash(&db, hash_api_key(&full_key).as_str())
            .await
            .unwrap()
            .unwrap();
        assert!(found.is_expired);

        let active = QueryBuilder::list_active_api_keys(&db).await.unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn test_revoke_by_prefix() {
        let db = setup_test_db().await;
        let (_, create) = key_create(None);
        QueryBuilder::create_api_key(&db, &create).await.unwrap();

        let revoked =
            QueryBuilder::deactivate_api_key_by_prefix(&db, create.key_prefix.as_str())
                .await
                .unwrap();
        assert!(revoked);

        let unknown = QueryBuilder::deactivate_api_key_by_prefix(&db, "cr_nothing")
            .await
            .unwrap();
        assert!(!unknown);

        let all = QueryBuilder::list_api_keys(&db).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].is_active);
        assert!(QueryBuilder::list_active_api_keys(&db).await.unwrap().is_empty());
    }
}
