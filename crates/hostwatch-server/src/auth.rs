use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

pub const API_KEY_HEADER: &str = "X-API-Key";

/// API 密钥认证中间件
pub async fn require_api_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    if !state.is_valid_key(key) {
        tracing::warn!(uri = %req.uri(), "Rejected request with invalid API key");
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(req).await)
}
