use chrono::{DateTime, Utc};
use hostwatch_config::DebounceConfig;
use hostwatch_types::AlertLevel;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 单个 (服务器, 指标) 的告警状态
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlertState {
    pub level: AlertLevel,
    pub consecutive_breach_count: u32,
    pub consecutive_clear_count: u32,
    pub last_transition_at: Option<DateTime<Utc>>,
    /// 最近一次至少送达一个收件人的通知级别
    pub last_notified_level: Option<AlertLevel>,
}

/// 一次相邻级别的迁移
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: AlertLevel,
    pub to: AlertLevel,
}

impl AlertState {
    /// 输入一次分级结果，返回触发的迁移
    ///
    /// 越限和恢复各自计数，任一方向的观测都会清零另一方向的计数；
    /// 计数达到阈值后只向目标移动一级，然后两个计数都清零。
    pub fn observe(
        &mut self,
        target: AlertLevel,
        debounce: &DebounceConfig,
        now: DateTime<Utc>,
    ) -> Option<Transition> {
        match target.cmp(&self.level) {
            Ordering::Equal => {
                self.reset_counters();
                None
            }
            Ordering::Greater => {
                self.consecutive_clear_count = 0;
                self.consecutive_breach_count += 1;
                if self.consecutive_breach_count >= debounce.breach {
                    Some(self.step(target, now))
                } else {
                    None
                }
            }
            Ordering::Less => {
                self.consecutive_breach_count = 0;
                self.consecutive_clear_count += 1;
                if self.consecutive_clear_count >= debounce.clear {
                    Some(self.step(target, now))
                } else {
                    None
                }
            }
        }
    }

    fn step(&mut self, target: AlertLevel, now: DateTime<Utc>) -> Transition {
        let from = self.level;
        let to = from.step_toward(target);
        self.level = to;
        self.reset_counters();
        self.last_transition_at = Some(now);
        Transition { from, to }
    }

    fn reset_counters(&mut self) {
        self.consecutive_breach_count = 0;
        self.consecutive_clear_count = 0;
    }
}
