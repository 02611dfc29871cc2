// HTTP API Error Types
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::auth::AuthError;
use crate::database::StoreError;
use crate::services::ServiceError;
use crate::validation::ValidationErrors;

/// Every failure a client can see. Handlers build one of these exactly once per
/// failed request, through [`ApiError::normalize`] or a constructor.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    ValidationError(ValidationErrors),
    CastError(String),
    Duplicate { field: String, message: String },

    // 401 Unauthorized
    Unauthorized(String),

    // 404 Not Found
    NotFound(String),

    // 413 Payload Too Large
    PayloadTooLarge(String),

    // 500 Internal Server Error
    Internal { message: String, detail: Option<String> },
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::ValidationError(_) => 400,
            ApiError::CastError(_) => 400,
            ApiError::Duplicate { .. } => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::NotFound(_) => 404,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::Internal { .. } => 500,
        }
    }

    /// Stable kind label returned in the `error` field
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::ValidationError(_) => "ValidationError",
            ApiError::CastError(_) => "CastError",
            ApiError::Duplicate { .. } => "DuplicateError",
            ApiError::Unauthorized(_) => "AuthenticationError",
            ApiError::NotFound(_) => "NotFoundError",
            ApiError::PayloadTooLarge(_) => "PayloadTooLargeError",
            ApiError::Internal { .. } => "InternalError",
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::ValidationError(_) => "Validation failed",
            ApiError::CastError(msg) => msg,
            ApiError::Duplicate { message, .. } => message,
            ApiError::Unauthorized(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::PayloadTooLarge(msg) => msg,
            ApiError::Internal { message, .. } => message,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "success": false,
            "error": self.kind(),
            "message": self.message(),
        });

        match self {
            ApiError::ValidationError(errors) => {
                body["errors"] = json!(errors);
            }
            ApiError::Duplicate { field, .. } => {
                body["field"] = json!(field);
            }
            ApiError::Internal { detail: Some(detail), .. } => {
                body["detail"] = json!(detail);
            }
            _ => {}
        }

        body
    }
}

impl ApiError {
    pub fn validation(errors: ValidationErrors) -> Self {
        ApiError::ValidationError(errors)
    }

    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::ValidationError(ValidationErrors::single(field, message))
    }

    pub fn cast_error() -> Self {
        ApiError::CastError("Invalid ID format".to_string())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn duplicate(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Duplicate {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn internal(message: impl Into<String>, detail: Option<String>) -> Self {
        ApiError::Internal {
            message: message.into(),
            detail,
        }
    }

    /// Map a service failure onto the client taxonomy. Raw error text is carried
    /// in `detail` only when `expose_detail` is set.
    pub fn normalize(err: ServiceError, expose_detail: bool) -> Self {
        match err {
            ServiceError::Validation(errors) => ApiError::validation(errors),
            ServiceError::InvalidId(_) => ApiError::cast_error(),
            ServiceError::NotFound(message) => ApiError::not_found(message),
            ServiceError::Duplicate { field, message } => ApiError::duplicate(field, message),
            ServiceError::Store(store_err) => Self::from_store(store_err, expose_detail),
        }
    }

    fn from_store(err: StoreError, expose_detail: bool) -> Self {
        let detail = expose_detail.then(|| err.to_string());
        match err {
            StoreError::Unavailable(_) => ApiError::internal("Service temporarily unavailable", detail),
            _ => ApiError::internal("An error occurred while processing your request", detail),
        }
    }
}

// Malformed or non-JSON bodies are reported against the pseudo-field "body".
// Bodies over the configured size limit keep their 413.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge("Request body exceeds the size limit".to_string());
        }
        ApiError::invalid_field("body", rejection.body_text())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::unauthorized(err.to_string())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::ValidationError(errors) => write!(f, "{}: {}", self.kind(), errors),
            _ => write!(f, "{}: {}", self.kind(), self.message()),
        }
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            match &self {
                ApiError::Internal { detail: Some(detail), .. } => tracing::error!("{} ({})", self, detail),
                _ => tracing::error!("{}", self),
            }
        } else {
            tracing::warn!("{}", self);
        }
        (status, Json(self.to_json())).into_response()
    }
}
