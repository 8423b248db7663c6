//! Boundary to the external image generation service.
//!
//! [`GenerationService`] is the only seam where variations are produced. The
//! intake service talks to it through `Arc<dyn GenerationService>` so the HTTP
//! client can be swapped for the mock (or a test double) without touching
//! intake logic.

pub mod http;
pub mod mock;

use std::sync::Arc;
use ag_core::JobDescriptor;
use async_trait::async_trait;
use thiserror::Error;
use crate::backend::config::{GenBackendConfig, ServiceMode};
use crate::storage::AssetStorage;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    #[error("generation service unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("generation service error: {0}")]
    UpstreamError(String),
    #[error("invalid generation job: {0}")]
    InvalidJob(String),
    #[error("asset storage error: {0}")]
    Storage(String),
}

impl AdapterError {
    /// Message safe to expose through the job status channel.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::UpstreamUnavailable(_) => "Generation service unavailable",
            Self::UpstreamError(_) => "Generation service error",
            Self::InvalidJob(_) => "Nothing to generate",
            Self::Storage(_) => "Internal server error",
        }
    }
}

/// Status returned by a generation service health probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceStatus {
    Available,
    Unavailable(String),
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    fn name(&self) -> &str;

    async fn health_check(&self) -> ServiceStatus;

    /// Produce one image reference per requested variation, in request order.
    async fn generate(&self, job: &JobDescriptor) -> Result<Vec<String>, AdapterError>;
}

/// Build the generation service selected by configuration.
pub fn create_service(
    config: &GenBackendConfig,
    storage: Arc<dyn AssetStorage>,
) -> anyhow::Result<Arc<dyn GenerationService>> {
    match config.ai_service_mode {
        ServiceMode::Http => Ok(Arc::new(http::HttpGenerationService::new(
            &config.ai_service_url,
            config.ai_service_timeout,
        )?)),
        ServiceMode::Mock => Ok(Arc::new(mock::MockGenerationService::new(
            storage,
            &config.public_base_url,
            config.mock_delay,
        ))),
    }
}

/// Reject jobs that request nothing.
pub(crate) fn expected_variations(job: &JobDescriptor) -> Result<usize, AdapterError> {
    match job.variation_count() {
        0 => Err(AdapterError::InvalidJob(
            "job has neither product images nor prompt lines".to_string(),
        )),
        n => Ok(n),
    }
}

/// The service must answer with exactly one image per requested variation.
pub(crate) fn check_variation_count(
    job: &JobDescriptor,
    images: Vec<String>,
) -> Result<Vec<String>, AdapterError> {
    let expected = job.variation_count();
    if images.len() != expected {
        return Err(AdapterError::UpstreamError(format!(
            "expected {} variations, service returned {}",
            expected,
            images.len()
        )));
    }
    Ok(images)
}
