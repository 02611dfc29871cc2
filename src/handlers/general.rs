use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::Document;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::resources::{Category, Product, ResourceKind};

#[derive(Debug, Deserialize)]
pub struct TypeQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// GET / - Welcome message and endpoint map
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "message": "Welcome to E-commerce API",
            "name": "Catalog API",
            "version": version,
            "store": state.store.backend(),
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "general": "/api?type=products|categories (public)",
                "products": "/api/products[/:id]",
                "categories": "/api/categories[/:id]",
            },
            "write_auth": state.security.require_auth_for_writes,
        }
    }))
}

/// GET /health - Store connectivity check
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "store": state.store.backend()
                }
            })),
        ),
        Err(e) => {
            tracing::error!("health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "InternalError",
                    "message": "Store unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "store": state.store.backend()
                    }
                })),
            )
        }
    }
}

/// GET /api?type=products|categories - List one resource family by name
pub async fn list_by_type(
    State(state): State<AppState>,
    Query(query): Query<TypeQuery>,
) -> ApiResult<Vec<Document>> {
    let kind = query
        .kind
        .as_deref()
        .and_then(|raw| raw.parse::<ResourceKind>().ok())
        .ok_or_else(|| {
            ApiError::invalid_field("type", r#"Invalid type parameter. Choose "products" or "categories"."#)
        })?;

    let records = match kind {
        ResourceKind::Products => state.service::<Product>().list().await,
        ResourceKind::Categories => state.service::<Category>().list().await,
    }
    .map_err(|e| state.normalize(e))?;

    Ok(ApiResponse::success(records))
}
