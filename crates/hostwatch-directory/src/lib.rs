pub mod directory;
pub mod error;
pub mod liveness;

pub use directory::{InMemoryDirectory, ServerDirectory};
pub use error::{DirectoryError, Result};
pub use liveness::LivenessMonitor;
