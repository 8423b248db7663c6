use ag_core::GenerationResult;
use thiserror::Error;
use tracing::info;
use crate::collector::{CollectError, ResultCollector};
use crate::stager::{AssetStager, StageError};
use crate::submit::{JobSubmissionClient, SubmissionOutcome, SubmitError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Invalid(#[from] StageError),
    #[error("{}", .0.user_message())]
    Submission(SubmissionOutcome),
    #[error(transparent)]
    Collect(#[from] CollectError),
}

impl From<SubmitError> for PipelineError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Invalid(e) => Self::Invalid(e),
        }
    }
}

/// Validate, submit, wait for the result and deliver it to the collector's sinks.
pub async fn run_generation(
    stager: &mut AssetStager,
    client: &JobSubmissionClient,
    collector: &ResultCollector,
) -> Result<GenerationResult, PipelineError> {
    let summary = stager.input_summary();
    let source = stager.source_tag();

    let ack = match client.submit_staged(stager).await? {
        SubmissionOutcome::Accepted(ack) => ack,
        other => return Err(PipelineError::Submission(other)),
    };
    info!(job_id = %ack.job_id, %source, "waiting for generation");

    Ok(collector.collect(&ack.job_id, &summary, source).await?)
}
