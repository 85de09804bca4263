pub mod app;
pub mod error;
pub mod loader;
pub mod manager;
pub mod policy;
pub mod provider;

pub use app::{
    AppConfig, AuthConfig, DatabaseConfig, DebounceConfig, HttpConfig, LivenessConfig,
    LoggingConfig, NotifyConfig, ServerEntry, SmtpConfig, StorageConfig, ThresholdsConfig,
};
pub use error::{ConfigError, PolicyError, Result};
pub use loader::ConfigLoader;
pub use manager::ConfigManager;
pub use policy::{PolicyHandle, PolicySnapshot, ThresholdPolicy, Thresholds};
pub use provider::{ConfigProvider, FileConfigProvider};
