//! Job intake: validate a submission, persist its assets, register the job
//! and hand it to the generation service without waiting for the result.

use std::sync::Arc;
use std::time::Duration;
use ag_core::schemas::{JobAck, JobStatusView, STATUS_PROCESSING};
use ag_core::{JobDescriptor, JobId};
use tracing::{error, info, warn};
use crate::backend::schemas::Submission;
use crate::clock::SubmissionClock;
use crate::error::IntakeError;
use crate::generator::GenerationService;
use crate::job::JobRegistry;
use crate::storage::AssetStorage;

pub const ACK_MESSAGE: &str = "Job submitted successfully";

#[derive(Clone)]
pub struct JobIntakeService {
    storage: Arc<dyn AssetStorage>,
    generator: Arc<dyn GenerationService>,
    registry: JobRegistry,
    clock: Arc<SubmissionClock>,
    max_product_images: usize,
}

impl JobIntakeService {
    pub fn new(
        storage: Arc<dyn AssetStorage>,
        generator: Arc<dyn GenerationService>,
        clock: Arc<SubmissionClock>,
        max_product_images: usize,
        job_retention: Duration,
    ) -> Self {
        Self {
            storage,
            generator,
            registry: JobRegistry::with_retention(job_retention),
            clock,
            max_product_images,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub async fn submit(&self, submission: Submission) -> Result<JobAck, IntakeError> {
        let Some(sample_ad) = submission.sample_ad else {
            return Err(IntakeError::MissingReference);
        };
        if submission.product_images.len() > self.max_product_images {
            return Err(IntakeError::TooManyProductImages {
                max: self.max_product_images,
                received: submission.product_images.len(),
            });
        }

        let job_id = JobId::from_token(self.clock.next());

        let reference = self.storage.store(&sample_ad.bytes, &sample_ad.file_name).await?;
        let mut replacement_paths = Vec::with_capacity(submission.product_images.len());
        for product in &submission.product_images {
            let stored = self.storage.store(&product.bytes, &product.file_name).await?;
            replacement_paths.push(stored.path_string());
        }

        let descriptor = JobDescriptor {
            job_id: job_id.clone(),
            reference_path: reference.path_string(),
            replacement_paths,
            prompt_text: submission.prompts_text.filter(|text| !text.trim().is_empty()),
        };

        self.registry.register(job_id.clone(), descriptor.source_tag()).await?;
        self.registry.mark_processing(&job_id).await?;

        info!(
            job_id = %job_id,
            source = %descriptor.source_tag(),
            variations = descriptor.variation_count(),
            service = self.generator.name(),
            "job accepted"
        );

        tokio::spawn(run_job(self.generator.clone(), self.registry.clone(), descriptor));

        Ok(JobAck {
            status: STATUS_PROCESSING.to_string(),
            job_id,
            message: Some(ACK_MESSAGE.to_string()),
        })
    }

    pub async fn job_status(&self, job_id: &JobId) -> Result<JobStatusView, IntakeError> {
        self.registry
            .get(job_id)
            .await
            .map(|entry| entry.view())
            .ok_or_else(|| IntakeError::JobNotFound(job_id.clone()))
    }
}

async fn run_job(
    generator: Arc<dyn GenerationService>,
    registry: JobRegistry,
    descriptor: JobDescriptor,
) {
    let job_id = descriptor.job_id.clone();
    let outcome = match generator.generate(&descriptor).await {
        Ok(images) => {
            info!(job_id = %job_id, count = images.len(), "job succeeded");
            registry.succeed(&job_id, images).await
        }
        Err(e) => {
            warn!(job_id = %job_id, error = %e, "job failed");
            registry.fail(&job_id, e.public_message()).await
        }
    };

    if let Err(e) = outcome {
        error!(job_id = %job_id, error = %e, "failed to record job outcome");
    }
}
