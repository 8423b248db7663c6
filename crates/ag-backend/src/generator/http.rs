use std::path::Path;
use std::time::Duration;
use ag_core::JobDescriptor;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, warn};
use crate::generator::{
    AdapterError, GenerationService, ServiceStatus, check_variation_count, expected_variations,
};

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    status: String,
    #[serde(default)]
    generated_images: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the external generation service's `POST /generate` contract.
pub struct HttpGenerationService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGenerationService {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn file_part(path: &str) -> Result<Part, AdapterError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AdapterError::Storage(format!("failed reading {path}: {e}")))?;
        let file_name = Path::new(path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("image.png")
            .to_string();
        Ok(Part::bytes(bytes).file_name(file_name))
    }

    async fn build_form(job: &JobDescriptor) -> Result<Form, AdapterError> {
        let mut form = Form::new().part("sample_ad", Self::file_part(&job.reference_path).await?);
        for path in &job.replacement_paths {
            form = form.part("product_images", Self::file_part(path).await?);
        }
        if let Some(prompts) = &job.prompt_text {
            form = form.text("prompts_text", prompts.clone());
        }
        Ok(form)
    }
}

#[async_trait]
impl GenerationService for HttpGenerationService {
    fn name(&self) -> &str {
        "http"
    }

    async fn health_check(&self) -> ServiceStatus {
        match self.client.get(format!("{}/health", self.base_url)).send().await {
            Ok(resp) if resp.status().is_success() => ServiceStatus::Available,
            Ok(resp) => ServiceStatus::Unavailable(format!("HTTP {}", resp.status())),
            Err(e) => ServiceStatus::Unavailable(e.to_string()),
        }
    }

    async fn generate(&self, job: &JobDescriptor) -> Result<Vec<String>, AdapterError> {
        expected_variations(job)?;
        let form = Self::build_form(job).await?;

        debug!(job_id = %job.job_id, url = %self.base_url, "forwarding job to generation service");
        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| AdapterError::UpstreamUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(job_id = %job.job_id, %status, "generation service rejected job");
            return Err(AdapterError::UpstreamError(format!("HTTP {}: {}", status, body)));
        }

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::UpstreamError(format!("failed to parse response: {e}")))?;

        match result.status.as_str() {
            "success" => check_variation_count(job, result.generated_images),
            "error" => Err(AdapterError::UpstreamError(
                result.error.unwrap_or_else(|| "unknown error".to_string()),
            )),
            other => Err(AdapterError::UpstreamError(format!("unexpected status: {other}"))),
        }
    }
}
