use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier assigned to a submission at intake time.
///
/// Rendered as the decimal form of a strictly increasing millisecond token,
/// so ids sort the same way submissions arrived.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn from_token(token: u64) -> Self {
        Self(token.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a generation job: `submitted -> processing -> {succeeded, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Submitted,
    Processing,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Submitted | Self::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (Self::Submitted, Self::Processing) => true,
            (Self::Submitted | Self::Processing, Self::Succeeded | Self::Failed) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which input modality produced a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Prompt,
    Image,
}

impl SourceTag {
    /// Prompt text wins whenever it carries at least one non-blank line.
    pub fn from_prompt_text(prompt_text: Option<&str>) -> Self {
        match prompt_text {
            Some(text) if !text.trim().is_empty() => Self::Prompt,
            _ => Self::Image,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown source tag: {0}")]
pub struct ParseSourceTagError(pub String);

impl FromStr for SourceTag {
    type Err = ParseSourceTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prompt" => Ok(Self::Prompt),
            "image" => Ok(Self::Image),
            other => Err(ParseSourceTagError(other.to_string())),
        }
    }
}

/// Non-blank prompt lines, trimmed, in submission order.
pub fn prompt_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// What the intake service hands to the generation service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobDescriptor {
    pub job_id: JobId,
    pub reference_path: String,
    pub replacement_paths: Vec<String>,
    pub prompt_text: Option<String>,
}

impl JobDescriptor {
    pub fn source_tag(&self) -> SourceTag {
        SourceTag::from_prompt_text(self.prompt_text.as_deref())
    }

    pub fn prompt_lines(&self) -> Vec<&str> {
        self.prompt_text.as_deref().map(prompt_lines).unwrap_or_default()
    }

    /// One variation per prompt line, or one per replacement slot.
    pub fn variation_count(&self) -> usize {
        match self.source_tag() {
            SourceTag::Prompt => self.prompt_lines().len(),
            SourceTag::Image => self.replacement_paths.len(),
        }
    }
}
