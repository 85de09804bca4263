use hostwatch_config::PolicyError;
use hostwatch_types::MetricKind;
use thiserror::Error;

/// 告警评估错误，均不改变状态
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlertError {
    /// 取值不在 [0, 100] 或不是有限数
    #[error("Invalid metric value for {kind}: {value}")]
    InvalidMetricValue { kind: MetricKind, value: f64 },

    /// 该指标没有配置阈值
    #[error("Unknown metric kind: {0}")]
    UnknownMetricKind(MetricKind),

    /// 策略里的阈值不合法；快照在发布前已校验，正常运行不会出现
    #[error("Invalid thresholds for {kind}: warning={warning}, critical={critical}")]
    InvalidThresholds {
        kind: MetricKind,
        warning: f64,
        critical: f64,
    },
}

impl From<PolicyError> for AlertError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::UnknownMetricKind(kind) => AlertError::UnknownMetricKind(kind),
            PolicyError::InvalidThresholds {
                kind,
                warning,
                critical,
            } => AlertError::InvalidThresholds {
                kind,
                warning,
                critical,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, AlertError>;
