use ag_core::schemas::{ErrorBody, JobAck};
use reqwest::multipart::{Form, Part};
use thiserror::Error;
use tracing::{info, warn};
use crate::asset::Asset;
use crate::stager::{AssetStager, StageError};

/// Result of one submission attempt. No retries are made.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    Accepted(JobAck),
    ConnectionFailed(String),
    ServiceRejected { status: u16, message: String },
}

impl SubmissionOutcome {
    /// The single message shown to the user.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Accepted(_) => "Job submitted successfully",
            Self::ConnectionFailed(_) => "Failed to connect to the server.",
            Self::ServiceRejected { .. } => "Generation failed. Please try again.",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] StageError),
}

/// Sends staged assets to `POST /api/generate` as one multipart request.
#[derive(Debug, Clone)]
pub struct JobSubmissionClient {
    http: reqwest::Client,
    base_url: String,
}

impl JobSubmissionClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Validate the stager first; invalid selections never reach the network.
    pub async fn submit_staged(&self, stager: &mut AssetStager) -> Result<SubmissionOutcome, SubmitError> {
        stager.validate_for_submission()?;
        let reference = stager.reference().ok_or(StageError::MissingReference)?;
        Ok(self
            .submit(reference, stager.replacements(), stager.prompt_text())
            .await)
    }

    pub async fn submit(&self, reference: &Asset, replacements: &[Asset], prompt_text: &str) -> SubmissionOutcome {
        let form = match build_form(reference, replacements, prompt_text) {
            Ok(form) => form,
            Err(e) => return SubmissionOutcome::ConnectionFailed(format!("invalid upload: {e}")),
        };

        let response = match self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .multipart(form)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "submission failed to reach the server");
                return SubmissionOutcome::ConnectionFailed(e.to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
            };
            warn!(status = status.as_u16(), %message, "submission rejected");
            return SubmissionOutcome::ServiceRejected {
                status: status.as_u16(),
                message,
            };
        }

        match response.json::<JobAck>().await {
            Ok(ack) if ack.is_accepted() => {
                info!(job_id = %ack.job_id, status = %ack.status, "submission accepted");
                SubmissionOutcome::Accepted(ack)
            }
            Ok(ack) => SubmissionOutcome::ServiceRejected {
                status: status.as_u16(),
                message: format!("unexpected job status `{}`", ack.status),
            },
            Err(e) => SubmissionOutcome::ConnectionFailed(format!("invalid response: {e}")),
        }
    }
}

fn asset_part(asset: &Asset) -> reqwest::Result<Part> {
    let part = Part::bytes(asset.bytes().to_vec()).file_name(asset.name().to_string());
    match asset.media_type() {
        Some(media_type) => part.mime_str(media_type),
        None => Ok(part),
    }
}

fn build_form(reference: &Asset, replacements: &[Asset], prompt_text: &str) -> reqwest::Result<Form> {
    let mut form = Form::new().part("sampleAd", asset_part(reference)?);
    for asset in replacements {
        form = form.part("productImages", asset_part(asset)?);
    }
    Ok(form.text("promptsText", prompt_text.to_string()))
}
