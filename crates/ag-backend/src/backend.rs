pub mod config;
pub mod routes;
pub mod schemas;
pub mod state;

use std::sync::Arc;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;
use crate::backend::config::GenBackendConfig;
use crate::backend::routes::api_routes;
use crate::backend::state::GenState;

/// Full HTTP surface: API routes plus stored uploads under `/uploads`.
pub fn build_router(state: Arc<GenState>) -> Router {
    let uploads = ServeDir::new(state.config.upload_dir.clone());

    Router::new()
        .merge(api_routes())
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct GenBackend {
    config: GenBackendConfig,
    state: Arc<GenState>,
}

impl GenBackend {
    pub async fn new(config: GenBackendConfig) -> anyhow::Result<Self> {
        let state = Arc::new(GenState::new(config.clone()).await?);
        Ok(Self { config, state })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = TcpListener::bind(addr).await?;

        info!(
            port = self.config.port,
            upload_dir = %self.config.upload_dir.display(),
            ai_service_url = %self.config.ai_service_url,
            ai_service_mode = ?self.config.ai_service_mode,
            "backend server running"
        );

        axum::serve(listener, build_router(self.state)).await?;
        Ok(())
    }
}
