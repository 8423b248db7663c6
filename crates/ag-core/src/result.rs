use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::job::{JobId, SourceTag};

/// Output of a completed job. `images[i]` is the i-th requested variation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub job_id: JobId,
    pub source: SourceTag,
    pub images: Vec<String>,
}

/// Summary of the inputs behind a result, kept alongside it in history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InputSummary {
    pub reference_name: String,
    pub prompt_text: Option<String>,
    pub replacement_count: Option<usize>,
}

/// A durable snapshot of one completed generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub reference_name: String,
    pub source: SourceTag,
    pub prompt_text: Option<String>,
    pub replacement_count: Option<usize>,
    pub images: Vec<String>,
}
