pub mod error;
pub mod state;
pub mod tracker;

pub use error::{AlertError, Result};
pub use state::{AlertState, Transition};
pub use tracker::{AlertKey, AlertStateTracker, KeySlot};
