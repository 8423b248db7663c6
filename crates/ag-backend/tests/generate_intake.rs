use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use ag_backend::clock::SubmissionClock;
use ag_backend::{
    AdapterError, AssetStorage, GenBackendConfig, GenState, GenerationService, LocalDiskStorage,
    ServiceStatus, StorageError, StoredAsset, build_router,
};
use ag_core::schemas::{ErrorBody, HealthResponse, JobAck, JobStatusView};
use ag_core::{JobDescriptor, JobStatus, SourceTag};
use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde::de::DeserializeOwned;
use tower::util::ServiceExt;

const BOUNDARY: &str = "----adgen-test-boundary";

#[derive(Default)]
struct MultipartBody {
    buf: Vec<u8>,
}

impl MultipartBody {
    fn file(mut self, field: &str, file_name: &str, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        self.buf.extend_from_slice(bytes);
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    fn text(mut self, field: &str, value: &str) -> Self {
        self.buf.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
        self
    }

    fn into_request(mut self) -> Request<Body> {
        self.buf.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri("/api/generate")
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(self.buf))
            .unwrap()
    }
}

/// Answers with one deterministic URL per variation, in request order.
struct EchoGenerationService;

#[async_trait]
impl GenerationService for EchoGenerationService {
    fn name(&self) -> &str {
        "echo"
    }

    async fn health_check(&self) -> ServiceStatus {
        ServiceStatus::Available
    }

    async fn generate(&self, job: &JobDescriptor) -> Result<Vec<String>, AdapterError> {
        Ok(match job.source_tag() {
            SourceTag::Prompt => job
                .prompt_lines()
                .iter()
                .map(|line| format!("https://cdn.test/prompt/{}", line.replace(' ', "-")))
                .collect(),
            SourceTag::Image => (1..=job.replacement_paths.len())
                .map(|i| format!("https://cdn.test/image/{i}.png"))
                .collect(),
        })
    }
}

struct DownGenerationService;

#[async_trait]
impl GenerationService for DownGenerationService {
    fn name(&self) -> &str {
        "down"
    }

    async fn health_check(&self) -> ServiceStatus {
        ServiceStatus::Unavailable("connection refused".into())
    }

    async fn generate(&self, _job: &JobDescriptor) -> Result<Vec<String>, AdapterError> {
        Err(AdapterError::UpstreamUnavailable("tcp connect error: 10.1.2.3:8000".into()))
    }
}

struct BrokenStorage;

#[async_trait]
impl AssetStorage for BrokenStorage {
    async fn store(&self, _bytes: &[u8], _suggested_name: &str) -> Result<StoredAsset, StorageError> {
        Err(StorageError::Io(std::io::Error::other("disk full at /var/lib/adgen")))
    }
}

async fn test_app(upload_dir: &Path, generator: Arc<dyn GenerationService>) -> Router {
    let clock = Arc::new(SubmissionClock::new());
    let storage = LocalDiskStorage::new(upload_dir, clock.clone()).await.unwrap();
    app_with(upload_dir, Arc::new(storage), generator, clock)
}

fn app_with(
    upload_dir: &Path,
    storage: Arc<dyn AssetStorage>,
    generator: Arc<dyn GenerationService>,
    clock: Arc<SubmissionClock>,
) -> Router {
    let mut config = GenBackendConfig::from_lookup(|_| None).unwrap();
    config.upload_dir = upload_dir.to_path_buf();
    build_router(Arc::new(GenState::with_components(config, storage, generator, clock)))
}

async fn app_with_upload_limit(upload_dir: &Path, max_upload_bytes: usize) -> Router {
    let clock = Arc::new(SubmissionClock::new());
    let storage = LocalDiskStorage::new(upload_dir, clock.clone()).await.unwrap();
    let mut config = GenBackendConfig::from_lookup(|_| None).unwrap();
    config.upload_dir = upload_dir.to_path_buf();
    config.max_upload_bytes = max_upload_bytes;
    build_router(Arc::new(GenState::with_components(
        config,
        Arc::new(storage),
        Arc::new(EchoGenerationService),
        clock,
    )))
}

async fn send<T: DeserializeOwned>(app: &Router, req: Request<Body>) -> (StatusCode, T) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn wait_for_terminal(app: &Router, job_id: &str) -> JobStatusView {
    for _ in 0..200 {
        let req = Request::builder()
            .uri(format!("/api/jobs/{job_id}"))
            .body(Body::empty())
            .unwrap();
        let (status, view): (_, JobStatusView) = send(app, req).await;
        assert_eq!(status, StatusCode::OK);
        if view.status.is_terminal() {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never reached a terminal state");
}

fn stored_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn health_reports_backend() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Arc::new(EchoGenerationService)).await;
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, body): (_, HealthResponse) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.status, "ok");
    assert_eq!(body.service, "backend");
}

#[tokio::test]
async fn product_images_produce_image_variations() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Arc::new(EchoGenerationService)).await;
    let req = MultipartBody::default()
        .file("sampleAd", "ad.png", b"reference")
        .file("productImages", "shoe.png", b"one")
        .file("productImages", "bag.png", b"two")
        .text("promptsText", "")
        .into_request();

    let (status, ack): (_, JobAck) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack.status, "processing");
    assert_eq!(ack.message.as_deref(), Some("Job submitted successfully"));
    assert!(ack.job_id.as_str().parse::<u64>().is_ok());

    let view = wait_for_terminal(&app, ack.job_id.as_str()).await;
    assert_eq!(view.status, JobStatus::Succeeded);
    assert_eq!(view.source, SourceTag::Image);
    assert_eq!(view.images.len(), 2);
    assert_eq!(stored_files(dir.path()).len(), 3);
}

#[tokio::test]
async fn prompt_lines_produce_ordered_prompt_variations() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Arc::new(EchoGenerationService)).await;
    let req = MultipartBody::default()
        .file("sampleAd", "ad.png", b"reference")
        .text("promptsText", "red shoe\nblue shoe")
        .into_request();

    let (status, ack): (_, JobAck) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let view = wait_for_terminal(&app, ack.job_id.as_str()).await;
    assert_eq!(view.source, SourceTag::Prompt);
    assert_eq!(
        view.images,
        vec!["https://cdn.test/prompt/red-shoe", "https://cdn.test/prompt/blue-shoe"]
    );
}

#[tokio::test]
async fn missing_sample_ad_is_rejected_without_storage_writes() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Arc::new(EchoGenerationService)).await;
    let req = MultipartBody::default()
        .file("productImages", "shoe.png", b"one")
        .text("promptsText", "red shoe")
        .into_request();

    let (status, body): (_, ErrorBody) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.error, "Sample ad is required");
    assert!(stored_files(dir.path()).is_empty());
}

#[tokio::test]
async fn empty_sample_ad_part_counts_as_missing() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Arc::new(EchoGenerationService)).await;
    let req = MultipartBody::default()
        .file("sampleAd", "", b"")
        .text("promptsText", "red shoe")
        .into_request();

    let (status, body): (_, ErrorBody) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.error, "Sample ad is required");
}

#[tokio::test]
async fn too_many_product_images_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Arc::new(EchoGenerationService)).await;
    let mut body = MultipartBody::default().file("sampleAd", "ad.png", b"reference");
    for i in 0..11 {
        body = body.file("productImages", &format!("p{i}.png"), b"x");
    }

    let (status, err): (_, ErrorBody) = send(&app, body.into_request()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err.error, "Too many product images");
    assert!(stored_files(dir.path()).is_empty());
}

#[tokio::test]
async fn identical_file_names_never_collide() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Arc::new(EchoGenerationService)).await;

    for _ in 0..2 {
        let req = MultipartBody::default()
            .file("sampleAd", "ad.png", b"reference")
            .file("productImages", "ad.png", b"product")
            .into_request();
        let (status, _): (_, JobAck) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
    }

    let files = stored_files(dir.path());
    assert_eq!(files.len(), 4);
    assert!(files.iter().all(|name| name.ends_with("-ad.png")));
}

#[tokio::test]
async fn upstream_failure_is_reported_through_status_channel() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Arc::new(DownGenerationService)).await;
    let req = MultipartBody::default()
        .file("sampleAd", "ad.png", b"reference")
        .text("promptsText", "red shoe")
        .into_request();

    let (status, ack): (_, JobAck) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let view = wait_for_terminal(&app, ack.job_id.as_str()).await;
    assert_eq!(view.status, JobStatus::Failed);
    assert_eq!(view.error.as_deref(), Some("Generation service unavailable"));
    assert!(view.images.is_empty());
}

#[tokio::test]
async fn storage_failure_returns_generic_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(
        dir.path(),
        Arc::new(BrokenStorage),
        Arc::new(EchoGenerationService),
        Arc::new(SubmissionClock::new()),
    );
    let req = MultipartBody::default()
        .file("sampleAd", "ad.png", b"reference")
        .text("promptsText", "red shoe")
        .into_request();

    let (status, body): (_, ErrorBody) = send(&app, req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body.error, "Internal server error");
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Arc::new(EchoGenerationService)).await;
    let req = Request::builder().uri("/api/jobs/12345").body(Body::empty()).unwrap();

    let (status, body): (_, ErrorBody) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body.error, "Job not found");
}

#[tokio::test]
async fn stored_uploads_are_served_back() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Arc::new(EchoGenerationService)).await;
    let req = MultipartBody::default()
        .file("sampleAd", "ad.png", b"reference-bytes")
        .text("promptsText", "red shoe")
        .into_request();
    let (_, _ack): (_, JobAck) = send(&app, req).await;

    let name = stored_files(dir.path()).remove(0);
    let req = Request::builder().uri(format!("/uploads/{name}")).body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"reference-bytes");
}

#[tokio::test]
async fn truncated_multipart_body_is_invalid_payload() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Arc::new(EchoGenerationService)).await;
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"sampleAd\"; filename=\"ad.png\"\r\n\r\npartial-bytes"
    );
    let req = Request::builder()
        .method("POST")
        .uri("/api/generate")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap();

    let (status, err): (_, ErrorBody) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err.error, "Invalid multipart payload");
    assert!(stored_files(dir.path()).is_empty());
}

#[tokio::test]
async fn oversized_upload_is_payload_too_large() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with_upload_limit(dir.path(), 1024).await;
    let req = MultipartBody::default()
        .file("sampleAd", "ad.png", &vec![7u8; 8 * 1024])
        .text("promptsText", "red shoe")
        .into_request();

    let (status, err): (_, ErrorBody) = send(&app, req).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(err.error, "Payload too large");
    assert!(stored_files(dir.path()).is_empty());
}

#[tokio::test]
async fn upload_within_limit_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with_upload_limit(dir.path(), 64 * 1024).await;
    let req = MultipartBody::default()
        .file("sampleAd", "ad.png", &vec![7u8; 8 * 1024])
        .text("promptsText", "red shoe")
        .into_request();

    let (status, _ack): (_, JobAck) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored_files(dir.path()).len(), 1);
}
