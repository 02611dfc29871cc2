use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::Document;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::resources::Resource;

/// GET /api/{collection} - List every record in insertion order
pub async fn list<R: Resource>(State(state): State<AppState>) -> ApiResult<Vec<Document>> {
    let records = state
        .service::<R>()
        .list()
        .await
        .map_err(|e| state.normalize(e))?;
    Ok(ApiResponse::success(records))
}

/// GET /api/{collection}/:id - Get a single record by ID
pub async fn get<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Document> {
    let record = state
        .service::<R>()
        .get(&id)
        .await
        .map_err(|e| state.normalize(e))?;
    Ok(ApiResponse::success(record))
}

/// POST /api/{collection} - Validate and create a record
pub async fn create<R: Resource>(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Document> {
    let Json(body) = body?;
    let record = state
        .service::<R>()
        .create(body)
        .await
        .map_err(|e| state.normalize(e))?;
    Ok(ApiResponse::created(record))
}

/// PUT /api/{collection}/:id - Apply the supplied fields to a record
pub async fn update<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Document> {
    // Id format is checked before the body so a bad id is always a CastError
    let service = state.service::<R>();
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            R::parse_id(&id).ok_or_else(ApiError::cast_error)?;
            return Err(rejection.into());
        }
    };

    let outcome = service
        .update(&id, body)
        .await
        .map_err(|e| state.normalize(e))?;
    let meta = json!({ "matched": outcome.matched, "modified": outcome.modified });
    Ok(ApiResponse::success(outcome.document).with_meta(meta))
}

/// DELETE /api/{collection}/:id - Hard delete a record
pub async fn delete<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let id = state
        .service::<R>()
        .delete(&id)
        .await
        .map_err(|e| state.normalize(e))?;
    Ok(ApiResponse::success(json!({
        "message": R::deleted_message(),
        "_id": id,
    })))
}
