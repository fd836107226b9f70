//! Authentication extractor for HTTP requests.

use std::fmt;

use crate::auth::context::CallerContext;
use crate::db::{Db, QueryBuilder};
use crate::types::{ApiKeyHash, ApiKeyPrefix, Capability, ExternalUserId, IdentityProvider};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Whether to allow anonymous access
    pub allow_anonymous: bool,
    /// Capabilities granted to anonymous callers
    #[serde(default = "default_anonymous_capabilities")]
    pub anonymous_capabilities: Vec<Capability>,
    /// Header name for API key authentication
    pub api_key_header: String,
    /// Expected API key value (for simple deployments)
    pub api_key: Option<String>,
    /// Capabilities granted to callers presenting the static API key
    #[serde(default = "default_api_key_capabilities")]
    pub api_key_capabilities: Vec<Capability>,
    /// Whether to enable database-backed API key lookup
    #[serde(default)]
    pub db_api_keys_enabled: bool,
}

fn default_anonymous_capabilities() -> Vec<Capability> {
    vec![Capability::new("course:view")]
}

fn default_api_key_capabilities() -> Vec<Capability> {
    vec![Capability::new(Capability::WILDCARD)]
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // Default to anonymous for local development
            allow_anonymous: true,
            anonymous_capabilities: default_anonymous_capabilities(),
            api_key_header: "X-API-Key".to_string(),
            api_key: None,
            api_key_capabilities: default_api_key_capabilities(),
            db_api_keys_enabled: false,
        }
    }
}

impl AuthConfig {
    /// Create a config for local single-user mode.
    pub fn local() -> Self {
        Self {
            allow_anonymous: true,
            ..Default::default()
        }
    }

    /// Create a config for static API key authentication.
    pub fn with_api_key(api_key: String) -> Self {
        Self {
            allow_anonymous: false,
            api_key: Some(api_key),
            ..Default::default()
        }
    }

    /// Create a config for database-backed API key authentication.
    pub fn with_db_api_keys() -> Self {
        Self {
            allow_anonymous: false,
            db_api_keys_enabled: true,
            ..Default::default()
        }
    }

    /// Settle anonymous access once the key sources are configured. Without
    /// an explicit choice, anonymous callers are admitted only when neither
    /// a static key nor database keys are enabled.
    pub fn with_anonymous_access(mut self, explicit: Option<bool>) -> Self {
        self.allow_anonymous =
            explicit.unwrap_or(self.api_key.is_none() && !self.db_api_keys_enabled);
        self
    }

    /// Replace the capabilities granted to anonymous callers.
    pub fn with_anonymous_capabilities(mut self, capabilities: Vec<Capability>) -> Self {
        self.anonymous_capabilities = capabilities;
        self
    }
}

/// Authentication errors.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// No authentication provided and anonymous not allowed
    Unauthenticated,
    /// Invalid API key
    InvalidApiKey,
    /// API key is expired
    ApiKeyExpired,
    /// API key is inactive/revoked
    ApiKeyRevoked,
    /// Database error
    DatabaseError(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "Authentication required"),
            Self::InvalidApiKey => write!(f, "Invalid API key"),
            Self::ApiKeyExpired => write!(f, "API key has expired"),
            Self::ApiKeyRevoked => write!(f, "API key has been revoked"),
            Self::DatabaseError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

/// Authentication extractor for HTTP requests.
pub struct AuthExtractor {
    config: AuthConfig,
    db: Db,
}

impl AuthExtractor {
    /// Create a new auth extractor.
    pub fn new(config: AuthConfig, db: Db) -> Self {
        Self { config, db }
    }

    /// Get reference to the auth configuration.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Get reference to the database.
    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Extract caller context from HTTP headers.
    ///
    /// This checks authentication in order:
    /// 1. Bearer token (treated as an API key)
    /// 2. API key header
    /// 3. Anonymous if allowed
    pub async fn extract_user(
        &self,
        authorization: Option<&str>,
        api_key: Option<&str>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<CallerContext, AuthError> {
        let presented = authorization
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .or(api_key);

        if let Some(key) = presented {
            return self.extract_from_api_key(key, ip_address, user_agent).await;
        }

        if self.config.allow_anonymous {
            debug!("No credentials presented, using anonymous caller");
            return Ok(
                CallerContext::anonymous(self.config.anonymous_capabilities.clone())
                    .with_client_info(ip_address, user_agent),
            );
        }

        Err(AuthError::Unauthenticated)
    }

    /// Extract caller from API key.
    ///
    /// The static key is checked first; any other key is looked up in the
    /// database when database-backed keys are enabled.
    pub async fn extract_from_api_key(
        &self,
        key: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<CallerContext, AuthError> {
        if let Some(expected_key) = &self.config.api_key
            && key == expected_key
        {
            let key_hash = hash_api_key(key);
            let ctx = CallerContext::new(
                ExternalUserId::new(key_hash.into_inner()),
                IdentityProvider::new("api_key"),
                Some("API User".to_string()),
                self.config.api_key_capabilities.clone(),
            )
            .with_client_info(ip_address, user_agent);
            return Ok(ctx);
        }

        if self.config.db_api_keys_enabled {
            return self
                .extract_from_db_api_key(key, ip_address, user_agent)
                .await;
        }

        warn!("Rejected unknown API key");
        Err(AuthError::InvalidApiKey)
    }

    /// Extract caller from database-backed API key.
    async fn extract_from_db_api_key(
        &self,
        key: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<CallerContext, AuthError> {
        let key_hash = hash_api_key(key);

        let api_key = QueryBuilder::find_api_key_by_hash(&self.db, key_hash.as_str())
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::InvalidApiKey)?;

        if !api_key.is_active {
            warn!(prefix = %api_key.key_prefix, "Rejected revoked API key");
            return Err(AuthError::ApiKeyRevoked);
        }

        if api_key.is_expired {
            warn!(prefix = %api_key.key_prefix, "Rejected expired API key");
            return Err(AuthError::ApiKeyExpired);
        }

        if let Err(e) = QueryBuilder::update_api_key_last_used(&self.db, &api_key.id).await {
            warn!("Failed to record API key use: {}", e);
        }

        let display_name = api_key
            .name
            .clone()
            .unwrap_or_else(|| format!("API Key {}", api_key.key_prefix));

        let capabilities = api_key
            .scopes
            .unwrap_or_default()
            .into_iter()
            .map(Capability::new)
            .collect();

        debug!(prefix = %api_key.key_prefix, "Authenticated database API key");

        let ctx = CallerContext::new(
            ExternalUserId::new(format!("api_key:{}", api_key.key_prefix)),
            IdentityProvider::new("api_key"),
            Some(display_name),
            capabilities,
        )
        .with_client_info(ip_address, user_agent);

        Ok(ctx)
    }
}

/// Hash an API key for storage and lookup (don't store raw keys).
pub fn hash_api_key(key: &str) -> ApiKeyHash {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let result = hasher.finalize();
    ApiKeyHash::new(format!("{:x}", result))
}

/// Generate a new API key with the format: prefix_randompart
/// Returns (full_key, prefix, hash)
pub fn generate_api_key() -> (String, ApiKeyPrefix, ApiKeyHash) {
    use uuid::Uuid;

    let prefix = ApiKeyPrefix::new(format!("cr_{}", &Uuid::new_v4().simple().to_string()[..8]));
    let secret = Uuid::new_v4().simple().to_string();
    let full_key = format!("{}_{}", prefix, secret);
    let key_hash = hash_api_key(&full_key);

    (full_key, prefix, key_hash)
}
