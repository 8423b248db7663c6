use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use ag_core::schemas::JobStatusView;
use ag_core::{JobId, JobStatus, SourceTag};
use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("job {0} is not registered")]
    NotFound(JobId),
    #[error("job {0} is already registered")]
    Duplicate(JobId),
    #[error("job {job_id} cannot move from {from} to {to}")]
    IllegalTransition {
        job_id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobEntry {
    pub job_id: JobId,
    pub source: SourceTag,
    pub status: JobStatus,
    pub images: Vec<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobEntry {
    fn new(job_id: JobId, source: SourceTag) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            source,
            status: JobStatus::Submitted,
            images: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn view(&self) -> JobStatusView {
        JobStatusView {
            job_id: self.job_id.clone(),
            status: self.status,
            source: self.source,
            images: self.images.clone(),
            error: self.error.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// In-memory job table backing the status endpoint.
///
/// Each job has a single writer (the task driving it) and any number of
/// readers. Terminal states are final: once a job succeeded or failed every
/// later transition is rejected.
///
/// With a retention set, finished jobs older than the retention are dropped
/// whenever a new job is registered; without one the table only grows.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<JobId, JobEntry>>>,
    retention: Option<TimeDelta>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            jobs: Arc::default(),
            retention: Some(TimeDelta::from_std(retention).unwrap_or(TimeDelta::MAX)),
        }
    }

    pub async fn register(&self, job_id: JobId, source: SourceTag) -> Result<(), RegistryError> {
        let mut jobs = self.jobs.write().await;
        self.evict_expired(&mut jobs);
        if jobs.contains_key(&job_id) {
            return Err(RegistryError::Duplicate(job_id));
        }
        jobs.insert(job_id.clone(), JobEntry::new(job_id, source));
        Ok(())
    }

    pub async fn mark_processing(&self, job_id: &JobId) -> Result<(), RegistryError> {
        self.transition(job_id, JobStatus::Processing, |_| {}).await
    }

    pub async fn succeed(&self, job_id: &JobId, images: Vec<String>) -> Result<(), RegistryError> {
        self.transition(job_id, JobStatus::Succeeded, |entry| entry.images = images)
            .await
    }

    pub async fn fail(&self, job_id: &JobId, error: impl Into<String>) -> Result<(), RegistryError> {
        let error = error.into();
        self.transition(job_id, JobStatus::Failed, |entry| entry.error = Some(error))
            .await
    }

    pub async fn get(&self, job_id: &JobId) -> Option<JobEntry> {
        self.jobs.read().await.get(job_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Drop succeeded/failed entries last updated before the retention window.
    pub async fn evict_finished(&self) -> usize {
        let mut jobs = self.jobs.write().await;
        self.evict_expired(&mut jobs)
    }

    fn evict_expired(&self, jobs: &mut HashMap<JobId, JobEntry>) -> usize {
        let Some(retention) = self.retention else {
            return 0;
        };
        let now = Utc::now();
        let before = jobs.len();
        jobs.retain(|_, entry| !(entry.status.is_terminal() && now - entry.updated_at > retention));
        let evicted = before - jobs.len();
        if evicted > 0 {
            debug!(evicted, remaining = jobs.len(), "evicted finished jobs");
        }
        evicted
    }

    async fn transition(
        &self,
        job_id: &JobId,
        next: JobStatus,
        apply: impl FnOnce(&mut JobEntry),
    ) -> Result<(), RegistryError> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(job_id)
            .ok_or_else(|| RegistryError::NotFound(job_id.clone()))?;

        if !entry.status.can_transition_to(next) {
            return Err(RegistryError::IllegalTransition {
                job_id: job_id.clone(),
                from: entry.status,
                to: next,
            });
        }

        apply(entry);
        entry.status = next;
        entry.updated_at = Utc::now();
        Ok(())
    }
}
