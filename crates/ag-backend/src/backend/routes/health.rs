use axum::Json;
use ag_core::schemas::HealthResponse;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "backend".to_string(),
    })
}
