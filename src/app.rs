use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{AppConfig, ConfigError, SecurityConfig, ServerConfig};
use crate::database::Store;
use crate::error::ApiError;
use crate::handlers::{general, resource};
use crate::middleware::require_auth;
use crate::resources::{Category, Product, Resource, Schemas};
use crate::services::{ResourceService, ServiceError};

/// Shared per-process state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub schemas: Arc<Schemas>,
    pub security: Arc<SecurityConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, schemas: Schemas, security: SecurityConfig) -> Self {
        Self {
            store,
            schemas: Arc::new(schemas),
            security: Arc::new(security),
        }
    }

    pub fn from_config(store: Arc<dyn Store>, config: &AppConfig) -> Result<Self, ConfigError> {
        let schemas = Schemas::from_config(&config.validation)?;
        Ok(Self::new(store, schemas, config.security.clone()))
    }

    pub fn service<R: Resource>(&self) -> ResourceService<R> {
        ResourceService::new(self.store.clone(), self.schemas.clone())
    }

    pub fn normalize(&self, err: ServiceError) -> ApiError {
        ApiError::normalize(err, self.security.expose_error_detail)
    }

    /// Declare unique fields for every resource on the store.
    pub async fn init_indexes(&self) -> Result<(), ServiceError> {
        self.service::<Product>().init_indexes().await?;
        self.service::<Category>().init_indexes().await?;
        Ok(())
    }
}

pub fn app(state: AppState, server: &ServerConfig) -> Router {
    let router = Router::new()
        // Public
        .route("/", get(general::root))
        .route("/health", get(general::health))
        .route("/api", get(general::list_by_type))
        // Catalog resources
        .merge(resource_routes::<Product>(&state))
        .merge(resource_routes::<Category>(&state))
        .layer(DefaultBodyLimit::max(server.max_request_size_bytes));

    let router = match cors_layer(&state.security) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    let router = if server.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };

    router.with_state(state)
}

/// The five operations for one resource. Create and update sit behind the write gate.
fn resource_routes<R: Resource>(state: &AppState) -> Router<AppState> {
    let gate = middleware::from_fn_with_state(state.clone(), require_auth);
    let collection = format!("/api/{}", R::COLLECTION);
    let record = format!("/api/{}/:id", R::COLLECTION);

    Router::new()
        .route(
            &collection,
            get(resource::list::<R>).merge(post(resource::create::<R>).layer(gate.clone())),
        )
        .route(
            &record,
            get(resource::get::<R>)
                .delete(resource::delete::<R>)
                .merge(put(resource::update::<R>).layer(gate)),
        )
}

fn cors_layer(security: &SecurityConfig) -> Option<CorsLayer> {
    if !security.enable_cors {
        return None;
    }
    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        return Some(CorsLayer::permissive());
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{issue_token, Claims};
    use crate::database::MemoryStore;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const SECRET: &str = "router-test-secret";

    async fn state(require_auth: bool) -> (AppState, ServerConfig) {
        let mut config = AppConfig::development();
        config.security.require_auth_for_writes = require_auth;
        config.security.jwt_secret = SECRET.to_string();
        let state = AppState::from_config(Arc::new(MemoryStore::new()), &config).unwrap();
        state.init_indexes().await.unwrap();
        (state, config.server)
    }

    async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn laptop() -> Value {
        json!({
            "name": "Gaming Laptop",
            "price": 1299.99,
            "description": "High-performance gaming laptop",
            "category": "Laptops",
            "brand": "Dell",
            "stock": 50,
            "SKU": "GL-2024-001"
        })
    }

    #[tokio::test]
    async fn product_lifecycle() {
        let (state, server) = state(false).await;
        let router = app(state, &server);

        let (status, body) = send(&router, Method::POST, "/api/products", Some(laptop()), None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], json!(true));
        let id = body["data"]["_id"].as_str().unwrap().to_string();

        let (status, body) = send(&router, Method::POST, "/api/products", Some(laptop()), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("DuplicateError"));
        assert_eq!(body["field"], json!("SKU"));

        let (status, body) = send(&router, Method::PUT, &format!("/api/products/{}", id), Some(json!({ "stock": 10 })), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["stock"], json!(10));
        assert_eq!(body["meta"], json!({ "matched": 1, "modified": 1 }));

        let (status, body) = send(&router, Method::DELETE, &format!("/api/products/{}", id), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["message"], json!("Product deleted successfully"));
        assert_eq!(body["data"]["_id"], json!(id));

        let (status, body) = send(&router, Method::GET, &format!("/api/products/{}", id), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], json!("Product not found"));
    }

    #[tokio::test]
    async fn malformed_id_is_cast_error() {
        let (state, server) = state(false).await;
        let router = app(state, &server);

        for method in [Method::GET, Method::DELETE] {
            let (status, body) = send(&router, method, "/api/categories/not-an-id", None, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], json!("CastError"));
            assert_eq!(body["message"], json!("Invalid ID format"));
        }

        let (_, body) = send(&router, Method::PUT, "/api/categories/not-an-id", Some(json!({ "name": "X" })), None).await;
        assert_eq!(body["error"], json!("CastError"));
    }

    #[tokio::test]
    async fn malformed_json_is_validation_error_on_body() {
        let (state, server) = state(false).await;
        let router = app(state, &server);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/categories")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{ not json"))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], json!("ValidationError"));
        assert_eq!(body["errors"][0]["field"], json!("body"));
    }

    #[tokio::test]
    async fn oversized_body_is_413() {
        let (state, mut server) = state(false).await;
        server.max_request_size_bytes = 64;
        let router = app(state, &server);

        let description = "x".repeat(256);
        let (status, body) = send(
            &router,
            Method::POST,
            "/api/categories",
            Some(json!({ "name": "Gaming", "description": description })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"], json!("PayloadTooLargeError"));

        let (status, _) = send(&router, Method::POST, "/api/categories", Some(json!({ "name": "Gaming" })), None).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn bad_id_wins_over_bad_body_on_update() {
        let (state, server) = state(false).await;
        let router = app(state, &server);

        let request = Request::builder()
            .method(Method::PUT)
            .uri("/api/products/not-an-id")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{ not json"))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], json!("CastError"));
    }

    #[tokio::test]
    async fn list_by_type() {
        let (state, server) = state(false).await;
        let router = app(state, &server);
        send(&router, Method::POST, "/api/categories", Some(json!({ "name": "Gaming" })), None).await;

        let (status, body) = send(&router, Method::GET, "/api?type=categories", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, body) = send(&router, Method::GET, "/api?type=widgets", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], json!("type"));
        assert_eq!(
            body["errors"][0]["message"],
            json!(r#"Invalid type parameter. Choose "products" or "categories"."#)
        );
    }

    #[tokio::test]
    async fn write_gate_requires_token() {
        let (state, server) = state(true).await;
        let router = app(state, &server);

        let (status, body) = send(&router, Method::POST, "/api/categories", Some(json!({ "name": "Gaming" })), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], json!("AuthenticationError"));

        let (status, _) = send(&router, Method::POST, "/api/categories", Some(json!({ "name": "Gaming" })), Some("garbage")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let token = issue_token(&Claims::new("octocat", "github", 1).unwrap(), SECRET).unwrap();
        let (status, _) = send(&router, Method::POST, "/api/categories", Some(json!({ "name": "Gaming" })), Some(&token)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = send(&router, Method::GET, "/api/categories", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn health_reports_store() {
        let (state, server) = state(false).await;
        let router = app(state, &server);
        let (status, body) = send(&router, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["store"], json!("memory"));
    }
}
