use crate::app::DebounceConfig;
use crate::error::PolicyError;
use arc_swap::ArcSwap;
use hostwatch_types::{AlertLevel, MetricKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// 单个指标的告警阈值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub warning: f64,
    pub critical: f64,
}

impl Thresholds {
    pub fn new(warning: f64, critical: f64) -> Self {
        Self { warning, critical }
    }

    /// 按阈值对原始值分级
    pub fn classify(&self, value: f64) -> AlertLevel {
        if value >= self.critical {
            AlertLevel::Critical
        } else if value >= self.warning {
            AlertLevel::Warning
        } else {
            AlertLevel::Normal
        }
    }

    /// 对应级别的阈值，Normal 没有阈值
    pub fn cutoff(&self, level: AlertLevel) -> Option<f64> {
        match level {
            AlertLevel::Normal => None,
            AlertLevel::Warning => Some(self.warning),
            AlertLevel::Critical => Some(self.critical),
        }
    }

    fn validate(&self, kind: MetricKind) -> Result<(), PolicyError> {
        let in_range = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
        if !in_range(self.warning) || !in_range(self.critical) || self.warning >= self.critical {
            return Err(PolicyError::InvalidThresholds {
                kind,
                warning: self.warning,
                critical: self.critical,
            });
        }
        Ok(())
    }
}

/// 阈值策略：指标类型 -> (warning, critical)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThresholdPolicy {
    kinds: BTreeMap<MetricKind, Thresholds>,
}

impl ThresholdPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: MetricKind, thresholds: Thresholds) -> Self {
        self.kinds.insert(kind, thresholds);
        self
    }

    pub fn thresholds_for(&self, kind: MetricKind) -> Result<Thresholds, PolicyError> {
        self.kinds
            .get(&kind)
            .copied()
            .ok_or(PolicyError::UnknownMetricKind(kind))
    }

    pub fn classify(&self, kind: MetricKind, value: f64) -> Result<AlertLevel, PolicyError> {
        Ok(self.thresholds_for(kind)?.classify(value))
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        for (kind, thresholds) in &self.kinds {
            thresholds.validate(*kind)?;
        }
        Ok(())
    }

    pub fn kinds(&self) -> impl Iterator<Item = (&MetricKind, &Thresholds)> {
        self.kinds.iter()
    }
}

/// 评估路径读取的不可变策略快照
#[derive(Debug, Clone, PartialEq)]
pub struct PolicySnapshot {
    pub policy: ThresholdPolicy,
    pub debounce: DebounceConfig,
    pub version: u64,
}

impl PolicySnapshot {
    pub fn new(policy: ThresholdPolicy, debounce: DebounceConfig) -> Self {
        Self {
            policy,
            debounce,
            version: 0,
        }
    }
}

/// 策略句柄
///
/// 热加载时整体替换快照，读者要么看到旧快照要么看到新快照。
pub struct PolicyHandle {
    current: ArcSwap<PolicySnapshot>,
}

impl PolicyHandle {
    pub fn new(snapshot: PolicySnapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(snapshot),
        }
    }

    pub fn load(&self) -> Arc<PolicySnapshot> {
        self.current.load_full()
    }

    /// 替换快照，版本号自动递增
    pub fn store(&self, mut snapshot: PolicySnapshot) -> u64 {
        let version = self.current.load().version + 1;
        snapshot.version = version;
        self.current.store(Arc::new(snapshot));
        version
    }

    pub fn version(&self) -> u64 {
        self.current.load().version
    }
}
