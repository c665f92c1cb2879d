use crate::core::response::HealthResponse;
use axum::response::IntoResponse;

/// 健康检查端点
pub async fn health_check() -> impl IntoResponse {
    tracing::debug!("Health check requested");
    HealthResponse::healthy()
}
