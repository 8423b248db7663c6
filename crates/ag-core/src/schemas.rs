//! JSON bodies exchanged between the intake service and its clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::job::{JobId, JobStatus, SourceTag};

pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_SUCCESS: &str = "success";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// Acknowledgment returned by `POST /api/generate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobAck {
    pub status: String,
    pub job_id: JobId,
    #[serde(default)]
    pub message: Option<String>,
}

impl JobAck {
    pub fn is_accepted(&self) -> bool {
        self.status == STATUS_PROCESSING || self.status == STATUS_SUCCESS
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

/// Body of `GET /api/jobs/{jobId}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub source: SourceTag,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
