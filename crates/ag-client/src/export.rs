//! Saving generated images to disk, one at a time or as a zip archive.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use ag_core::SourceTag;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt, stream};
use thiserror::Error;
use tracing::{info, warn};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;
use crate::asset::guess_media_type;

pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 4;
const DEFAULT_EXTENSION: &str = "png";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("nothing to export")]
    Empty,
    #[error("failed to fetch image {index} ({reference}): {reason}")]
    FetchFailed { index: usize, reference: String, reason: String },
    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to build archive: {0}")]
    Archive(#[from] zip::result::ZipError),
}

/// Image bytes plus the extension derived from their declared type.
#[derive(Debug, Clone)]
struct FetchedImage {
    bytes: Vec<u8>,
    extension: String,
}

#[derive(Debug, Clone)]
pub struct ArtifactExporter {
    http: reqwest::Client,
    out_dir: PathBuf,
    max_concurrent_fetches: usize,
}

impl ArtifactExporter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            http: reqwest::Client::new(),
            out_dir: out_dir.into(),
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
        }
    }

    pub fn with_max_concurrent_fetches(mut self, limit: usize) -> Self {
        self.max_concurrent_fetches = limit.max(1);
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// `variation_<tag>_<n>.<ext>` with `n` counted from 1.
    pub fn single_filename(tag: SourceTag, index: usize, extension: &str) -> String {
        format!("variation_{}_{}.{}", tag, index + 1, extension)
    }

    pub fn archive_filename(tag: SourceTag, timestamp: DateTime<Utc>) -> String {
        format!("ad-variations_{}_{}.zip", tag, timestamp.format("%Y-%m-%d"))
    }

    pub async fn export_single(&self, image_ref: &str, tag: SourceTag, index: usize) -> Result<String, ExportError> {
        let image = self.fetch(index, image_ref).await?;
        let file_name = Self::single_filename(tag, index, &image.extension);

        self.write_atomically(&file_name, &image.bytes).await?;
        info!(file = %file_name, "exported image");
        Ok(file_name)
    }

    /// All or nothing: a single failed fetch means no archive is written.
    pub async fn export_all(&self, image_refs: &[String], tag: SourceTag, timestamp: DateTime<Utc>) -> Result<String, ExportError> {
        if image_refs.is_empty() {
            return Err(ExportError::Empty);
        }

        let images: Vec<FetchedImage> = stream::iter(image_refs.iter().enumerate())
            .map(|(index, reference)| self.fetch(index, reference))
            .buffered(self.max_concurrent_fetches)
            .try_collect()
            .await?;

        let archive = build_archive(&images, tag)?;
        let file_name = Self::archive_filename(tag, timestamp);
        self.write_atomically(&file_name, &archive).await?;

        info!(file = %file_name, images = images.len(), "exported archive");
        Ok(file_name)
    }

    async fn fetch(&self, index: usize, reference: &str) -> Result<FetchedImage, ExportError> {
        let fetched = if reference.starts_with("http://") || reference.starts_with("https://") {
            self.fetch_remote(reference).await
        } else {
            fetch_local(reference).await
        };

        fetched.map_err(|reason| {
            warn!(index, reference, %reason, "image fetch failed");
            ExportError::FetchFailed {
                index,
                reference: reference.to_string(),
                reason,
            }
        })
    }

    async fn fetch_remote(&self, url: &str) -> Result<FetchedImage, String> {
        let response = self.http.get(url).send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("server answered {status}"));
        }

        let extension = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(extension_for)
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
        let bytes = response.bytes().await.map_err(|e| e.to_string())?;

        Ok(FetchedImage {
            bytes: bytes.to_vec(),
            extension,
        })
    }

    async fn write_atomically(&self, file_name: &str, bytes: &[u8]) -> Result<(), ExportError> {
        tokio::fs::create_dir_all(&self.out_dir).await?;
        let staging = self
            .out_dir
            .join(format!(".{}.{}.part", file_name, uuid::Uuid::new_v4()));
        let target = self.out_dir.join(file_name);

        if let Err(e) = tokio::fs::write(&staging, bytes).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&staging, &target).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }
        Ok(())
    }
}

async fn fetch_local(reference: &str) -> Result<FetchedImage, String> {
    let path = reference.strip_prefix("file://").unwrap_or(reference);
    let bytes = tokio::fs::read(path).await.map_err(|e| e.to_string())?;
    let extension = guess_media_type(path)
        .map(extension_for)
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    Ok(FetchedImage { bytes, extension })
}

/// `image/jpeg; charset=binary` -> `jpeg`. Anything that could not be a
/// plain file extension falls back to `png`.
fn extension_for(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .and_then(|mime| mime.trim().split_once('/'))
        .map(|(_, subtype)| subtype.trim().to_ascii_lowercase())
        .filter(|subtype| is_safe_extension(subtype))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

fn is_safe_extension(ext: &str) -> bool {
    !ext.is_empty()
        && !ext.contains("..")
        && ext
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'.' | b'+' | b'-'))
}

fn build_archive(images: &[FetchedImage], tag: SourceTag) -> Result<Vec<u8>, ExportError> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (index, image) in images.iter().enumerate() {
        zip.start_file(ArtifactExporter::single_filename(tag, index, &image.extension), options)?;
        zip.write_all(&image.bytes)?;
    }

    Ok(zip.finish()?.into_inner())
}
