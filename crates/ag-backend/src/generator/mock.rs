//! Stand-in generation service.
//!
//! Waits for a configurable delay, then renders one placeholder PNG per
//! requested variation into asset storage and returns URLs under
//! `/uploads`. Used until a real generation service is wired in; neither the
//! delay nor the images are part of the contract.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use ag_core::{JobDescriptor, SourceTag};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tracing::info;
use crate::generator::{AdapterError, GenerationService, ServiceStatus, expected_variations};
use crate::storage::AssetStorage;

const WIDTH: u32 = 320;
const HEIGHT: u32 = 400;

pub struct MockGenerationService {
    storage: Arc<dyn AssetStorage>,
    public_base_url: String,
    delay: Duration,
}

impl MockGenerationService {
    pub fn new(storage: Arc<dyn AssetStorage>, public_base_url: &str, delay: Duration) -> Self {
        Self {
            storage,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            delay,
        }
    }

    /// One label per variation: the prompt line, or the product file name.
    fn labels(job: &JobDescriptor) -> Vec<String> {
        match job.source_tag() {
            SourceTag::Prompt => job.prompt_lines().into_iter().map(str::to_string).collect(),
            SourceTag::Image => job
                .replacement_paths
                .iter()
                .map(|path| {
                    Path::new(path)
                        .file_stem()
                        .map(|stem| stem.to_string_lossy().to_string())
                        .unwrap_or_default()
                })
                .collect(),
        }
    }
}

#[async_trait]
impl GenerationService for MockGenerationService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn health_check(&self) -> ServiceStatus {
        ServiceStatus::Available
    }

    async fn generate(&self, job: &JobDescriptor) -> Result<Vec<String>, AdapterError> {
        expected_variations(job)?;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut images = Vec::new();
        for (index, label) in Self::labels(job).iter().enumerate() {
            let png = render_placeholder(label)?;
            let stored = self
                .storage
                .store(&png, &format!("variation_{}_{}.png", job.job_id, index + 1))
                .await
                .map_err(|e| AdapterError::Storage(e.to_string()))?;
            images.push(format!("{}/uploads/{}", self.public_base_url, stored.file_name));
        }

        info!(job_id = %job.job_id, count = images.len(), "mock generation complete");
        Ok(images)
    }
}

/// Pick a base colour from the label (placeholder logic)
fn color_hint(label: &str) -> [u8; 3] {
    let lower = label.to_lowercase();

    if lower.contains("red") {
        [220, 80, 80]
    } else if lower.contains("blue") {
        [80, 110, 220]
    } else if lower.contains("green") {
        [90, 180, 100]
    } else if lower.contains("yellow") {
        [235, 215, 90]
    } else if lower.contains("purple") {
        [160, 90, 200]
    } else {
        // stable colour per label
        let hash = label.bytes().fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        [
            ((hash >> 16) & 0xFF) as u8 / 2 + 96,
            ((hash >> 8) & 0xFF) as u8 / 2 + 96,
            (hash & 0xFF) as u8 / 2 + 96,
        ]
    }
}

/// Vertical gradient of the hint colour with a lighter "product" block.
fn render_placeholder(label: &str) -> Result<Vec<u8>, AdapterError> {
    let base = color_hint(label);
    let img = RgbaImage::from_fn(WIDTH, HEIGHT, |x, y| {
        let shade = 0.6 + 0.4 * (1.0 - y as f32 / HEIGHT as f32);
        let in_block = (WIDTH / 4..WIDTH * 3 / 4).contains(&x) && (HEIGHT / 3..HEIGHT * 2 / 3).contains(&y);
        let lift = if in_block { 1.25 } else { 1.0 };
        let channel = |c: u8| ((c as f32 * shade * lift).min(255.0)) as u8;
        Rgba([channel(base[0]), channel(base[1]), channel(base[2]), 255])
    });

    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| AdapterError::UpstreamError(format!("failed to encode placeholder: {e}")))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use ag_core::JobId;
    use crate::clock::SubmissionClock;
    use crate::storage::LocalDiskStorage;
    use super::*;

    #[test]
    fn test_color_extraction() {
        let red = color_hint("a red shoe");
        assert!(red[0] > red[1] && red[0] > red[2]);

        let blue = color_hint("Blue sneaker");
        assert!(blue[2] > blue[0] && blue[2] > blue[1]);

        assert_eq!(color_hint("perfume"), color_hint("perfume"));
    }

    #[test]
    fn test_placeholder_is_png() {
        let png = render_placeholder("green bottle").unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[tokio::test]
    async fn test_generates_one_stored_image_per_prompt_line() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalDiskStorage::new(dir.path(), Arc::new(SubmissionClock::new()))
            .await
            .unwrap();
        let service = MockGenerationService::new(Arc::new(storage), "http://localhost:3000/", Duration::ZERO);

        let job = JobDescriptor {
            job_id: JobId::from_token(5),
            reference_path: "uploads/ad.png".into(),
            replacement_paths: vec![],
            prompt_text: Some("red shoe\nblue shoe".into()),
        };
        let images = service.generate(&job).await.unwrap();

        assert_eq!(images.len(), 2);
        assert!(images[0].starts_with("http://localhost:3000/uploads/"));
        assert!(images[0].ends_with("-variation_5_1.png"));
        assert!(images[1].ends_with("-variation_5_2.png"));

        let file_name = images[0].rsplit('/').next().unwrap();
        assert!(dir.path().join(file_name).exists());
    }

    #[tokio::test]
    async fn test_empty_job_fails() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalDiskStorage::new(dir.path(), Arc::new(SubmissionClock::new()))
            .await
            .unwrap();
        let service = MockGenerationService::new(Arc::new(storage), "http://localhost:3000", Duration::ZERO);
        let job = JobDescriptor {
            job_id: JobId::from_token(6),
            reference_path: "uploads/ad.png".into(),
            replacement_paths: vec![],
            prompt_text: None,
        };
        assert!(matches!(service.generate(&job).await, Err(AdapterError::InvalidJob(_))));
    }
}
