pub mod asset;
pub mod collector;
pub mod export;
pub mod history;
pub mod pipeline;
pub mod stager;
pub mod submit;

pub use asset::Asset;
pub use collector::{CollectError, PollSettings, ResultCollector, ResultSink};
pub use export::{ArtifactExporter, ExportError};
pub use history::{HistoryError, HistoryListing, HistoryOrder, HistoryStore, NewHistoryRecord};
pub use pipeline::{PipelineError, run_generation};
pub use stager::{AssetStager, StageError};
pub use submit::{JobSubmissionClient, SubmissionOutcome, SubmitError};
