use std::sync::Arc;
use axum::Router;
use axum::routing::{get, post};
use crate::backend::routes::health::health;
use crate::backend::routes::job::{generate, job_status};
use crate::backend::state::GenState;

mod health;
mod job;

pub fn api_routes() -> Router<Arc<GenState>> {
    Router::new()
        .route("/health", get(health))
        .route("/api/generate", post(generate))
        .route("/api/jobs/{id}", get(job_status))
}
