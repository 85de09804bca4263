use hostwatch_types::MetricKind;
use thiserror::Error;

/// 阈值策略错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("No thresholds configured for metric kind: {0}")]
    UnknownMetricKind(MetricKind),

    #[error("Invalid thresholds for {kind}: warning={warning}, critical={critical}")]
    InvalidThresholds {
        kind: MetricKind,
        warning: f64,
        critical: f64,
    },
}

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Source(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConfigError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ConfigError::Invalid(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
