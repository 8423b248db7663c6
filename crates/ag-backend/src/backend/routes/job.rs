use std::sync::Arc;
use ag_core::JobId;
use ag_core::schemas::{JobAck, JobStatusView};
use axum::Json;
use axum::extract::{Multipart, Path, State};
use crate::backend::schemas::Submission;
use crate::backend::state::GenState;
use crate::error::IntakeError;

pub async fn generate(
    State(state): State<Arc<GenState>>,
    mut multipart: Multipart,
) -> Result<Json<JobAck>, IntakeError> {
    let submission = Submission::from_multipart(&mut multipart).await?;
    let ack = state.intake.submit(submission).await?;
    Ok(Json(ack))
}

pub async fn job_status(
    State(state): State<Arc<GenState>>,
    Path(id): Path<String>,
) -> Result<Json<JobStatusView>, IntakeError> {
    let view = state.intake.job_status(&JobId::from(id)).await?;
    Ok(Json(view))
}
