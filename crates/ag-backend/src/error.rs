use ag_core::JobId;
use ag_core::schemas::ErrorBody;
use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;
use crate::job::RegistryError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Sample ad is required")]
    MissingReference,
    #[error("Too many product images")]
    TooManyProductImages { max: usize, received: usize },
    #[error("Invalid multipart payload")]
    InvalidPayload(String),
    #[error("Payload too large")]
    PayloadTooLarge,
    #[error("Job not found")]
    JobNotFound(JobId),
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
    #[error("job registry failure: {0}")]
    Registry(#[from] RegistryError),
}

impl IntakeError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingReference | Self::TooManyProductImages { .. } | Self::InvalidPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::JobNotFound(_) => StatusCode::NOT_FOUND,
            Self::Storage(_) | Self::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Bodies over the upload limit are 413; every other multipart failure is 400.
impl From<MultipartError> for IntakeError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::InvalidPayload(err.to_string())
        }
    }
}

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = if status.is_server_error() {
            error!(error = %self, "intake failed");
            ErrorBody::new("Internal server error")
        } else {
            ErrorBody::new(self.to_string())
        };
        (status, Json(body)).into_response()
    }
}
