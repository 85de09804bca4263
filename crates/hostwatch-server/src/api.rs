use crate::auth::require_api_key;
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use hostwatch_core::Submission;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// 创建 API 路由
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/monitor/data", post(submit_monitor_data))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        // 健康检查
        .route("/health", get(health_check))
        .merge(protected)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 健康检查
async fn health_check() -> &'static str {
    "OK"
}

/// 采集端提交监控数据
async fn submit_monitor_data(
    State(state): State<AppState>,
    payload: Result<Json<Submission>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(submission) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    if !submission.identifies_server() {
        return Err(ApiError::BadRequest("server_id or ip_address is required".to_string()));
    }
    if submission.metrics.is_empty() {
        return Err(ApiError::BadRequest("metrics must not be empty".to_string()));
    }

    let outcome = state.coordinator.ingest_batch(&submission).await?;
    info!(
        server_id = ?submission.server_id,
        ip = %submission.ip_address,
        matched = outcome.server_matched,
        accepted = outcome.accepted(),
        rejected = outcome.rejected(),
        "Monitor data submitted"
    );

    let message = if outcome.server_matched {
        "Monitor data recorded"
    } else {
        "Monitor data recorded, no registered server matched"
    };

    Ok(Json(json!({
        "code": 200,
        "message": message,
        "data": outcome,
    })))
}
