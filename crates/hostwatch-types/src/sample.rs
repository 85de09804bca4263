use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 采样解析错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SampleError {
    #[error("Unknown metric kind: {0}")]
    UnknownMetricKind(String),
}

/// 监控指标类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Cpu,
    Memory,
    Disk,
}

impl MetricKind {
    pub const ALL: [MetricKind; 3] = [MetricKind::Cpu, MetricKind::Memory, MetricKind::Disk];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Cpu => "cpu",
            MetricKind::Memory => "memory",
            MetricKind::Disk => "disk",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = SampleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(MetricKind::Cpu),
            "memory" => Ok(MetricKind::Memory),
            "disk" => Ok(MetricKind::Disk),
            other => Err(SampleError::UnknownMetricKind(other.to_string())),
        }
    }
}

/// 单次上报的指标采样
///
/// 创建后不可修改，由摄取协调器消费一次。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    server_ip: String,
    metric_kind: MetricKind,
    value: f64,
    observed_at: DateTime<Utc>,
}

impl MetricSample {
    pub fn new(
        server_ip: impl Into<String>,
        metric_kind: MetricKind,
        value: f64,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            server_ip: server_ip.into(),
            metric_kind,
            value,
            observed_at,
        }
    }

    /// 以当前时间作为采样时间
    pub fn now(server_ip: impl Into<String>, metric_kind: MetricKind, value: f64) -> Self {
        Self::new(server_ip, metric_kind, value, Utc::now())
    }

    pub fn server_ip(&self) -> &str {
        &self.server_ip
    }

    pub fn metric_kind(&self) -> MetricKind {
        self.metric_kind
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// 客户端提供的采样时间，不可信，不参与排序
    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metric_kind() {
        assert_eq!("cpu".parse::<MetricKind>().unwrap(), MetricKind::Cpu);
        assert_eq!(" Memory ".parse::<MetricKind>().unwrap(), MetricKind::Memory);
        assert_eq!("disk".parse::<MetricKind>().unwrap(), MetricKind::Disk);

        let err = "gpu".parse::<MetricKind>().unwrap_err();
        assert_eq!(err, SampleError::UnknownMetricKind("gpu".to_string()));
    }

    #[test]
    fn test_metric_kind_serde() {
        let json = serde_json::to_string(&MetricKind::Memory).unwrap();
        assert_eq!(json, "\"memory\"");
        assert_eq!(MetricKind::Disk.to_string(), "disk");
    }

    #[test]
    fn test_sample_accessors() {
        let sample = MetricSample::now("10.0.0.1", MetricKind::Cpu, 42.5);
        assert_eq!(sample.server_ip(), "10.0.0.1");
        assert_eq!(sample.metric_kind(), MetricKind::Cpu);
        assert_eq!(sample.value(), 42.5);
    }
}
