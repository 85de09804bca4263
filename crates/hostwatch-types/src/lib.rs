pub mod alert;
pub mod sample;
pub mod server;

pub use alert::{AlertEvent, AlertLevel};
pub use sample::{MetricKind, MetricSample, SampleError};
pub use server::{Server, ServerId, ServerStatus, UserRef};
