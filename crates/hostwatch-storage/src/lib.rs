pub mod error;
pub mod memory;
pub mod model;
pub mod retention;
pub mod sql;
pub mod store;

pub use error::{Result, StorageError};
pub use memory::MemorySampleStore;
pub use model::StoredSample;
pub use retention::RetentionTask;
pub use sql::SqlSampleStore;
pub use store::SampleStore;
