use chrono::{DateTime, Utc};
use hostwatch_types::{MetricKind, MetricSample, ServerId};
use serde::{Deserialize, Serialize};

/// 持久化的采样
///
/// `server_id` 为空表示 IP 未匹配到服务器，仅作审计保留。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSample {
    pub server_id: Option<ServerId>,
    pub server_ip: String,
    pub metric_kind: MetricKind,
    pub value: f64,
    /// 客户端上报的时间，仅存储
    pub observed_at: DateTime<Utc>,
    /// 服务端接受的时间，保留期按此计算
    pub accepted_at: DateTime<Utc>,
}

impl StoredSample {
    pub fn from_sample(
        sample: &MetricSample,
        server_id: Option<ServerId>,
        accepted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            server_id,
            server_ip: sample.server_ip().to_string(),
            metric_kind: sample.metric_kind(),
            value: sample.value(),
            observed_at: sample.observed_at(),
            accepted_at,
        }
    }

    pub fn is_unassigned(&self) -> bool {
        self.server_id.is_none()
    }
}
