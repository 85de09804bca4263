pub mod coordinator;
pub mod error;
pub mod submission;

pub use coordinator::{IngestResult, IngestionCoordinator, NotifiedLevelRecorder};
pub use error::{IngestError, Result};
pub use submission::{BatchOutcome, MetricOutcome, Submission, SubmissionMetrics};
