//! Durable storage for uploaded and generated assets.
//!
//! Every stored file is named `<token>-<original name>` where the token comes
//! from the shared [`SubmissionClock`], so two uploads can never land on the
//! same path even when their original names are identical.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use crate::clock::SubmissionClock;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("refusing to overwrite existing asset {0}")]
    Collision(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredAsset {
    /// Location on the storage backend.
    pub path: PathBuf,
    /// Collision-free name, also the key under `/uploads`.
    pub file_name: String,
}

impl StoredAsset {
    pub fn path_string(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}

#[async_trait]
pub trait AssetStorage: Send + Sync {
    async fn store(&self, bytes: &[u8], suggested_name: &str) -> Result<StoredAsset, StorageError>;
}

/// Stores assets as files in a single uploads directory.
#[derive(Debug, Clone)]
pub struct LocalDiskStorage {
    root: PathBuf,
    clock: Arc<SubmissionClock>,
}

impl LocalDiskStorage {
    pub async fn new(root: impl Into<PathBuf>, clock: Arc<SubmissionClock>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root, clock })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl AssetStorage for LocalDiskStorage {
    async fn store(&self, bytes: &[u8], suggested_name: &str) -> Result<StoredAsset, StorageError> {
        let file_name = format!("{}-{}", self.clock.next(), sanitize_file_name(suggested_name));
        let path = self.root.join(&file_name);
        let staging = self.root.join(format!(".{}.{}.part", file_name, uuid::Uuid::new_v4()));

        tokio::fs::write(&staging, bytes).await?;

        // hard_link fails if the target exists, which gives create-new semantics
        let linked = tokio::fs::hard_link(&staging, &path).await;
        let _ = tokio::fs::remove_file(&staging).await;
        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::Collision(file_name));
            }
            Err(e) => return Err(e.into()),
        }

        debug!(file = %file_name, size = bytes.len(), "stored asset");
        Ok(StoredAsset { path, file_name })
    }
}

/// Reduce a client-supplied file name to a safe single path component.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}
