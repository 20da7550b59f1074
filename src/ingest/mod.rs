pub mod clock;
pub mod decode;
pub mod models;
pub mod notifier;
pub mod pipeline;
pub mod processor;
pub mod processor_enums;

pub use models::{BatchReport, EventFailure, EventOutcome, IngestStage, SkipReason};
pub use pipeline::IngestPipeline;
