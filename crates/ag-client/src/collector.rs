//! Waits for a submitted job to finish and fans the result out.

use std::sync::Arc;
use std::time::Duration;
use ag_core::schemas::{ErrorBody, JobStatusView};
use ag_core::{GenerationResult, InputSummary, JobId, JobStatus, SourceTag};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 300,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollectError {
    #[error("connection to the backend failed: {0}")]
    Connection(String),
    #[error("job {0} is unknown to the backend")]
    NotFound(JobId),
    #[error("generation failed: {0}")]
    JobFailed(String),
    #[error("job {job_id} still running after {attempts} polls")]
    TimedOut { job_id: JobId, attempts: u32 },
    #[error("result sink failed: {0}")]
    Sink(String),
}

/// Receives every completed result, e.g. the history store.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn accept(&self, result: &GenerationResult, summary: &InputSummary) -> anyhow::Result<()>;
}

pub struct ResultCollector {
    http: reqwest::Client,
    base_url: String,
    settings: PollSettings,
    latest: RwLock<Option<GenerationResult>>,
    sinks: RwLock<Vec<Arc<dyn ResultSink>>>,
    events: broadcast::Sender<GenerationResult>,
}

impl ResultCollector {
    pub fn new(base_url: &str, settings: PollSettings) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            settings,
            latest: RwLock::new(None),
            sinks: RwLock::new(Vec::new()),
            events,
        }
    }

    pub async fn add_sink(&self, sink: Arc<dyn ResultSink>) {
        self.sinks.write().await.push(sink);
    }

    /// Display subscribers see each delivered result once.
    pub fn subscribe(&self) -> broadcast::Receiver<GenerationResult> {
        self.events.subscribe()
    }

    pub async fn latest(&self) -> Option<GenerationResult> {
        self.latest.read().await.clone()
    }

    /// Poll until the job reaches a terminal state.
    pub async fn wait_for(&self, job_id: &JobId, source: SourceTag) -> Result<GenerationResult, CollectError> {
        let url = format!("{}/api/jobs/{}", self.base_url, job_id);

        for attempt in 1..=self.settings.max_attempts {
            let view = self.poll_once(&url, job_id).await?;
            debug!(job_id = %job_id, attempt, status = %view.status, "polled job");

            match view.status {
                JobStatus::Succeeded => {
                    return Ok(GenerationResult {
                        job_id: job_id.clone(),
                        source,
                        images: view.images,
                    });
                }
                JobStatus::Failed => {
                    let reason = view.error.unwrap_or_else(|| "unknown error".to_string());
                    return Err(CollectError::JobFailed(reason));
                }
                JobStatus::Submitted | JobStatus::Processing => {
                    if attempt < self.settings.max_attempts {
                        tokio::time::sleep(self.settings.interval).await;
                    }
                }
            }
        }

        Err(CollectError::TimedOut {
            job_id: job_id.clone(),
            attempts: self.settings.max_attempts,
        })
    }

    async fn poll_once(&self, url: &str, job_id: &JobId) -> Result<JobStatusView, CollectError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| CollectError::Connection(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CollectError::NotFound(job_id.clone()));
        }
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(CollectError::Connection(message));
        }

        response
            .json::<JobStatusView>()
            .await
            .map_err(|e| CollectError::Connection(format!("invalid status body: {e}")))
    }

    /// Store as latest, broadcast, then hand to every sink in registration order.
    pub async fn deliver(&self, result: GenerationResult, summary: &InputSummary) -> Result<(), CollectError> {
        *self.latest.write().await = Some(result.clone());
        // no subscribers is fine
        let _ = self.events.send(result.clone());

        let sinks = self.sinks.read().await.clone();
        let mut first_error = None;
        for sink in sinks {
            if let Err(e) = sink.accept(&result, summary).await {
                warn!(job_id = %result.job_id, error = %e, "result sink failed");
                first_error.get_or_insert_with(|| e.to_string());
            }
        }

        match first_error {
            Some(message) => Err(CollectError::Sink(message)),
            None => Ok(()),
        }
    }

    pub async fn collect(&self, job_id: &JobId, summary: &InputSummary, source: SourceTag) -> Result<GenerationResult, CollectError> {
        let result = self.wait_for(job_id, source).await?;
        info!(job_id = %job_id, images = result.images.len(), "job completed");
        self.deliver(result.clone(), summary).await?;
        Ok(result)
    }
}
