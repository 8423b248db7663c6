pub mod backend;
pub mod clock;
pub mod error;
pub mod generator;
pub mod intake;
pub mod job;
pub mod storage;

pub use backend::config::{GenBackendConfig, ServiceMode};
pub use backend::state::GenState;
pub use backend::{GenBackend, build_router};
pub use error::IntakeError;
pub use generator::{AdapterError, GenerationService, ServiceStatus};
pub use intake::JobIntakeService;
pub use job::{JobEntry, JobRegistry, RegistryError};
pub use storage::{AssetStorage, LocalDiskStorage, StorageError, StoredAsset};
