use crate::sample::MetricKind;
use crate::server::ServerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 告警级别
///
/// 有序：Normal < Warning < Critical。状态迁移每次只跨一级。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    #[default]
    Normal,
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Normal => "normal",
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
        }
    }

    /// 向目标级别移动一级；已经在目标级别时原样返回
    pub fn step_toward(self, target: AlertLevel) -> AlertLevel {
        use std::cmp::Ordering;
        match target.cmp(&self) {
            Ordering::Greater => match self {
                AlertLevel::Normal => AlertLevel::Warning,
                _ => AlertLevel::Critical,
            },
            Ordering::Less => match self {
                AlertLevel::Critical => AlertLevel::Warning,
                _ => AlertLevel::Normal,
            },
            Ordering::Equal => self,
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 告警级别迁移事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub server_id: ServerId,
    pub server_name: String,
    pub metric_kind: MetricKind,
    pub from_level: AlertLevel,
    pub to_level: AlertLevel,
    pub value: f64,
    pub occurred_at: DateTime<Utc>,
}

impl AlertEvent {
    /// 级别升高（*→Warning, *→Critical）
    pub fn is_escalation(&self) -> bool {
        self.to_level > self.from_level
    }

    /// 级别降低
    pub fn is_recovery(&self) -> bool {
        self.to_level < self.from_level
    }
}
