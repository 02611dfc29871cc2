use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::auth::{bearer_token, verify_token};
use crate::error::ApiError;

/// Write gate: when enabled, the request must carry a valid bearer token.
/// Passes everything through when gating is off.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.security.require_auth_for_writes {
        return Ok(next.run(request).await);
    }

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .map(|value| value.to_str().unwrap_or_default());
    let token = bearer_token(header)?;
    let claims = verify_token(token, &state.security.jwt_secret)?;

    tracing::debug!("write authorized for {} via {}", claims.sub, claims.provider);

    Ok(next.run(request).await)
}
