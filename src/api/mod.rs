// REST API endpoints for the roster service

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde_json::{Map, Value, json};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthError, AuthExtractor, CallerContext};
use crate::enrollment::{EnrollmentQuery, EnrollmentService, ServiceError};
use crate::params::{EnrollmentParams, ParameterValidator};
use crate::server::RequestCredentials;

/// Shared state of the REST router.
pub struct ApiState {
    pub service: Arc<EnrollmentService>,
    pub auth: Arc<AuthExtractor>,
    pub validator: Arc<dyn ParameterValidator>,
}

pub type AppState = Arc<ApiState>;

impl ApiState {
    pub fn new(service: Arc<EnrollmentService>, auth: Arc<AuthExtractor>) -> Self {
        Self {
            service,
            auth,
            validator: Arc::new(EnrollmentParams),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/courses/{course_id}/users", get(list_users))
        .route("/courses/{course_id}/users/count", get(count_users))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Error body: `{ "error": <kind>, "message": <text> }`.
#[derive(Debug)]
pub enum ApiError {
    Service(ServiceError),
    Auth(AuthError),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self::Service(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Service(ServiceError::Validation(_)) => StatusCode::BAD_REQUEST,
            Self::Service(ServiceError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Service(ServiceError::Authorization { .. }) => StatusCode::FORBIDDEN,
            Self::Service(ServiceError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(AuthError::DatabaseError(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Service(err) => err.kind(),
            Self::Auth(AuthError::DatabaseError(_)) => "store",
            Self::Auth(_) => "authentication",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Service(err) => err.to_string(),
            Self::Auth(err) => err.to_string(),
        };
        let body = json!({ "error": self.kind(), "message": message });
        (self.status(), Json(body)).into_response()
    }
}

async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Authenticate the request and validate path plus query parameters.
async fn prepare(
    state: &ApiState,
    headers: &HeaderMap,
    course_id: String,
    params: HashMap<String, String>,
) -> Result<(CallerContext, EnrollmentQuery), ApiError> {
    let creds = RequestCredentials::from_headers(headers, &state.auth.config().api_key_header);
    let caller = state
        .auth
        .extract_user(
            creds.authorization.as_deref(),
            creds.api_key.as_deref(),
            creds.ip_address,
            creds.user_agent,
        )
        .await?;

    let mut args: Map<String, Value> = params
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    args.insert("course_id".to_string(), Value::String(course_id));

    let query = state.validator.validate(&args)?;
    Ok((caller, query))
}

async fn list_users(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let (caller, query) = prepare(&state, &headers, course_id, params).await?;
    let users = state.service.list_enrolled_users(&caller, &query).await?;
    Ok(Json(json!({ "users": users })))
}

async fn count_users(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let (caller, query) = prepare(&state, &headers, course_id, params).await?;
    let count = state.service.count_enrolled_users(&caller, &query).await?;
    Ok(Json(json!({ "count": count })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthConfig, CapabilityChecker};
    use crate::db::{
        DatabaseConfig, RosterSeed, SurrealEnrollmentStore, create_connection, ensure_schema,
        import,
    };
    use crate::enrollment::ServiceSettings;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn router(auth: AuthConfig) -> Router {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };
        let db = create_connection(config).await.unwrap();
        ensure_schema(&db).await.unwrap();

        let seed: RosterSeed = serde_json::from_value(json!({
            "courses": [
                { "id": 10, "fullname": "Algebra I", "shortname": "ALG1", "context_id": 110 },
                { "id": 20, "fullname": "Orphan", "shortname": "ORPH" }
            ],
            "users": [
                { "id": 1, "firstname": "Ana", "lastname": "Lima", "email": "ana@example.com", "username": "ana" },
                { "id": 2, "firstname": "Bruno", "lastname": "Costa", "email": "bruno@example.com", "username": "bruno" }
            ],
            "enrol_methods": [{ "id": 1, "course_id": 10 }],
            "enrolments": [{ "user_id": 1, "enrol_id": 1 }, { "user_id": 2, "enrol_id": 1 }],
            "roles": [{ "id": 4, "shortname": "ta" }, { "id": 5, "shortname": "student" }],
            "role_assignments": [
                { "user_id": 1, "role_id": 5, "context_id": 110 },
                { "user_id": 2, "role_id": 4, "context_id": 110 }
            ]
        }))
        .unwrap();
        import(&db, &seed).await.unwrap();

        let service = EnrollmentService::new(
            Arc::new(SurrealEnrollmentStore::new(db.clone())),
            Arc::new(CapabilityChecker),
            ServiceSettings::default(),
        );
        let state = ApiState::new(Arc::new(service), Arc::new(AuthExtractor::new(auth, db)));
        create_router(Arc::new(state))
    }

    async fn get_json(router: Router, uri: &str, api_key: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder().uri(uri);
        if let Some(key) = api_key {
            request = request.header("X-API-Key", key);
        }
        let response = router
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(router(AuthConfig::local()).await, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_list_and_count_as_anonymous() {
        let app = router(AuthConfig::local()).await;

        let (status, body) = get_json(app.clone(), "/courses/10/users?role=ta", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["users"].as_array().unwrap().len(), 1);
        assert_eq!(body["users"][0]["username"], "bruno");
        assert_eq!(body["users"][0]["cpf"], "");

        let (status, body) = get_json(app, "/courses/10/users/count", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "count": 2 }));
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let app = router(AuthConfig::local()).await;

        let (status, body) = get_json(app.clone(), "/courses/99/users", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");

        let (status, body) = get_json(app.clone(), "/courses/abc/users", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");

        let (status, _) = get_json(app.clone(), "/courses/10/users?limit=3", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // course 20 has no context
        let (status, body) = get_json(app, "/courses/20/users/count", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "course context not found: 20");
    }

    #[tokio::test]
    async fn test_authentication_and_authorization() {
        let app = router(AuthConfig::with_api_key("secret123".to_string())).await;

        let (status, body) = get_json(app.clone(), "/courses/10/users", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "authentication");

        let (status, _) = get_json(app.clone(), "/courses/10/users", Some("wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = get_json(app, "/courses/10/users/count", Some("secret123")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);

        let locked = router(AuthConfig::local().with_anonymous_capabilities(vec![])).await;
        let (status, body) = get_json(locked, "/courses/10/users", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "authorization");
    }

    #[tokio::test]
    async fn test_configured_key_disables_anonymous_access() {
        let config = crate::ServiceConfig::default();

        // `server --api-key secret123`
        let app = router(config.network_auth(Some("secret123".to_string()), false, None)).await;
        let (status, body) = get_json(app.clone(), "/courses/10/users", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.get("users").is_none());

        let (status, body) = get_json(app, "/courses/10/users", Some("secret123")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["users"].as_array().unwrap().len(), 2);

        // `server --enable-db-api-keys`
        let app = router(config.network_auth(None, true, None)).await;
        let (status, _) = get_json(app, "/courses/10/users/count", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // `server --api-key secret123 --allow-anonymous true`
        let app = router(config.network_auth(Some("secret123".to_string()), false, Some(true))).await;
        let (status, _) = get_json(app, "/courses/10/users/count", None).await;
        assert_eq!(status, StatusCode::OK);

        // no key source at all keeps the local default
        let app = router(config.network_auth(None, false, None)).await;
        let (status, _) = get_json(app, "/courses/10/users/count", None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
