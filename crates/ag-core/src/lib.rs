pub mod job;
pub mod result;
pub mod schemas;

pub use job::{JobDescriptor, JobId, JobStatus, ParseSourceTagError, SourceTag, prompt_lines};
pub use result::{GenerationResult, HistoryRecord, InputSummary};
