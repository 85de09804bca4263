use chrono::{DateTime, Utc};
use hostwatch_types::{MetricKind, MetricSample, ServerId};
use serde::{Deserialize, Serialize};

/// 客户端一次提交的指标
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SubmissionMetrics {
    #[serde(default, alias = "cpu")]
    pub cpu_value: Option<f64>,
    #[serde(default, alias = "memory")]
    pub memory_value: Option<f64>,
    #[serde(default, alias = "disk")]
    pub disk_value: Option<f64>,
}

impl SubmissionMetrics {
    pub fn get(&self, kind: MetricKind) -> Option<f64> {
        match kind {
            MetricKind::Cpu => self.cpu_value,
            MetricKind::Memory => self.memory_value,
            MetricKind::Disk => self.disk_value,
        }
    }

    pub fn is_empty(&self) -> bool {
        MetricKind::ALL.iter().all(|k| self.get(*k).is_none())
    }
}

/// 采集端提交
///
/// `server_id` 与 `ip_address` 至少给一个，同时给出时按 `server_id` 查找。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Submission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<ServerId>,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub metrics: SubmissionMetrics,
    /// 客户端时间，只存储，不参与排序
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Submission {
    pub fn new(ip_address: impl Into<String>, metrics: SubmissionMetrics) -> Self {
        Self {
            server_id: None,
            ip_address: ip_address.into(),
            metrics,
            timestamp: None,
        }
    }

    pub fn for_server(server_id: ServerId, metrics: SubmissionMetrics) -> Self {
        Self {
            server_id: Some(server_id),
            ip_address: String::new(),
            metrics,
            timestamp: None,
        }
    }

    /// 是否带有可用于查找服务器的标识
    pub fn identifies_server(&self) -> bool {
        self.server_id.is_some() || !self.ip_address.trim().is_empty()
    }

    /// 每个出现的指标生成一个采样
    pub fn samples(&self, now: DateTime<Utc>) -> Vec<MetricSample> {
        self.samples_for(&self.ip_address, now)
    }

    /// 同 `samples`，采样记在 `server_ip` 名下
    pub fn samples_for(&self, server_ip: &str, now: DateTime<Utc>) -> Vec<MetricSample> {
        let observed_at = self.timestamp.unwrap_or(now);
        MetricKind::ALL
            .iter()
            .filter_map(|kind| {
                self.metrics
                    .get(*kind)
                    .map(|value| MetricSample::new(server_ip.to_string(), *kind, value, observed_at))
            })
            .collect()
    }
}

/// 单个指标的处理结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricOutcome {
    pub metric: MetricKind,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// 一次提交的处理结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub server_matched: bool,
    pub metrics: Vec<MetricOutcome>,
}

impl BatchOutcome {
    pub fn accepted(&self) -> usize {
        self.metrics.iter().filter(|m| m.accepted).count()
    }

    pub fn rejected(&self) -> usize {
        self.metrics.len() - self.accepted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_aliases() {
        let long: Submission = serde_json::from_str(
            r#"{"ip_address":"10.0.0.1","metrics":{"cpu_value":12.5,"disk_value":40}}"#,
        )
        .unwrap();
        let short: Submission = serde_json::from_str(
            r#"{"ip_address":"10.0.0.1","metrics":{"cpu":12.5,"disk":40}}"#,
        )
        .unwrap();

        assert_eq!(long.metrics.cpu_value, Some(12.5));
        assert_eq!(short.metrics.cpu_value, Some(12.5));
        assert_eq!(short.metrics.memory_value, None);
        assert_eq!(short.metrics.disk_value, Some(40.0));
    }

    #[test]
    fn test_samples_only_for_present_metrics() {
        let submission = Submission::new(
            "10.0.0.1",
            SubmissionMetrics {
                memory_value: Some(55.0),
                ..Default::default()
            },
        );

        let samples = submission.samples(Utc::now());
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].metric_kind(), MetricKind::Memory);
        assert_eq!(samples[0].server_ip(), "10.0.0.1");
    }

    #[test]
    fn test_server_id_without_ip() {
        let submission: Submission =
            serde_json::from_str(r#"{"server_id":7,"metrics":{"cpu":30}}"#).unwrap();
        assert_eq!(submission.server_id, Some(ServerId(7)));
        assert!(submission.ip_address.is_empty());
        assert!(submission.identifies_server());

        let samples = submission.samples_for("10.0.0.7", Utc::now());
        assert_eq!(samples[0].server_ip(), "10.0.0.7");

        let anonymous: Submission = serde_json::from_str(r#"{"metrics":{"cpu":30}}"#).unwrap();
        assert!(!anonymous.identifies_server());
    }

    #[test]
    fn test_missing_metrics_is_empty() {
        let submission: Submission = serde_json::from_str(r#"{"ip_address":"10.0.0.1"}"#).unwrap();
        assert!(submission.metrics.is_empty());
        assert!(submission.samples(Utc::now()).is_empty());
    }
}
