use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hostwatch_core::IngestError;
use serde_json::json;
use thiserror::Error;

/// API 错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    /// 缺少或无效的 API 密钥
    #[error("Invalid or missing API key")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "code": status.as_u16(),
            "message": self.to_string(),
            "data": null,
        }));

        (status, body).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        tracing::error!(error = %err, "Ingestion failed");
        ApiError::Internal("Failed to record monitor data".to_string())
    }
}
