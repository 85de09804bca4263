use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hostwatch_types::{AlertEvent, AlertLevel, MetricKind, ServerId, UserRef};
use std::time::Duration;
use tracing::debug;

/// 冷却账本中的一条发送记录
///
/// 键只看目标级别，升级到 Warning 与回落到 Warning 共用同一个冷却期。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NotificationRecord {
    pub server_id: ServerId,
    pub metric_kind: MetricKind,
    pub level: AlertLevel,
    pub recipient: String,
}

impl NotificationRecord {
    pub fn new(event: &AlertEvent, recipient: &UserRef) -> Self {
        Self {
            server_id: event.server_id,
            metric_kind: event.metric_kind,
            level: event.to_level,
            recipient: recipient.email.clone(),
        }
    }
}

/// 通知冷却账本
///
/// 冷却期内同一条记录只放行一次。预占在发送之前完成，
/// 并发重放同一个事件时只有一个能拿到名额。
pub struct CooldownLedger {
    sent_at: DashMap<NotificationRecord, DateTime<Utc>>,
    cooldown: chrono::Duration,
}

impl CooldownLedger {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            sent_at: DashMap::new(),
            cooldown: chrono::Duration::from_std(cooldown)
                .unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX / 1000)),
        }
    }

    /// 尝试占用名额，冷却期内已有记录时返回 false
    pub fn try_reserve(&self, record: &NotificationRecord, now: DateTime<Utc>) -> bool {
        match self.sent_at.entry(record.clone()) {
            Entry::Occupied(mut slot) => {
                if now.signed_duration_since(*slot.get()) < self.cooldown {
                    debug!(
                        server_id = %record.server_id,
                        metric = %record.metric_kind,
                        level = %record.level,
                        recipient = %record.recipient,
                        "Notification suppressed by cooldown"
                    );
                    return false;
                }
                slot.insert(now);
                true
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }

    /// 投递失败时归还名额
    pub fn release(&self, record: &NotificationRecord) {
        self.sent_at.remove(record);
    }

    /// 清理已过冷却期的记录，返回清理数量
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.sent_at.len();
        self.sent_at
            .retain(|_, sent_at| now.signed_duration_since(*sent_at) < self.cooldown);
        before - self.sent_at.len()
    }

    pub fn len(&self) -> usize {
        self.sent_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent_at.is_empty()
    }
}
