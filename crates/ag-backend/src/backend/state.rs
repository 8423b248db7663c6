use std::sync::Arc;
use tracing::{info, warn};
use crate::backend::config::GenBackendConfig;
use crate::clock::SubmissionClock;
use crate::generator::{self, GenerationService, ServiceStatus};
use crate::intake::JobIntakeService;
use crate::storage::{AssetStorage, LocalDiskStorage};

pub struct GenState {
    pub config: GenBackendConfig,
    pub intake: JobIntakeService,
}

impl GenState {
    /// Wire up local disk storage and the configured generation service.
    pub async fn new(config: GenBackendConfig) -> anyhow::Result<Self> {
        let clock = Arc::new(SubmissionClock::new());
        let storage: Arc<dyn AssetStorage> =
            Arc::new(LocalDiskStorage::new(config.upload_dir.clone(), clock.clone()).await?);
        let generator = generator::create_service(&config, storage.clone())?;

        match generator.health_check().await {
            ServiceStatus::Available => info!(service = generator.name(), "generation service available"),
            ServiceStatus::Unavailable(reason) => {
                warn!(service = generator.name(), %reason, "generation service not reachable yet")
            }
        }

        Ok(Self::with_components(config, storage, generator, clock))
    }

    pub fn with_components(
        config: GenBackendConfig,
        storage: Arc<dyn AssetStorage>,
        generator: Arc<dyn GenerationService>,
        clock: Arc<SubmissionClock>,
    ) -> Self {
        let intake = JobIntakeService::new(
            storage,
            generator,
            clock,
            config.max_product_images,
            config.job_retention,
        );
        Self { config, intake }
    }
}
