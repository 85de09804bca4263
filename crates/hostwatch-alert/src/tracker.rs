use crate::error::{AlertError, Result};
use crate::state::AlertState;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hostwatch_config::PolicyHandle;
use hostwatch_types::{AlertEvent, AlertLevel, MetricKind, MetricSample, Server, ServerId};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

/// 告警状态键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlertKey {
    pub server_id: ServerId,
    pub metric_kind: MetricKind,
}

impl AlertKey {
    pub fn new(server_id: ServerId, metric_kind: MetricKind) -> Self {
        Self {
            server_id,
            metric_kind,
        }
    }
}

/// 已持有的键锁，drop 时释放
pub struct KeySlot {
    key: AlertKey,
    guard: OwnedMutexGuard<AlertState>,
}

impl KeySlot {
    pub fn key(&self) -> AlertKey {
        self.key
    }
}

/// 告警状态跟踪器
///
/// 每个 (服务器, 指标) 一把互斥锁。tokio 的 Mutex 按等待顺序放行，
/// 同一个键的采样按被接受的顺序生效；不同键之间互不阻塞。
pub struct AlertStateTracker {
    states: DashMap<AlertKey, Arc<Mutex<AlertState>>>,
    policy: Arc<PolicyHandle>,
}

impl AlertStateTracker {
    pub fn new(policy: Arc<PolicyHandle>) -> Self {
        Self {
            states: DashMap::new(),
            policy,
        }
    }

    /// 评估一次采样，级别迁移时返回事件
    pub async fn observe(&self, server: &Server, sample: &MetricSample) -> Result<Option<AlertEvent>> {
        self.observe_at(server, sample, Utc::now()).await
    }

    /// 同 `observe`，`accepted_at` 为协调器接受采样的时间
    pub async fn observe_at(
        &self,
        server: &Server,
        sample: &MetricSample,
        accepted_at: DateTime<Utc>,
    ) -> Result<Option<AlertEvent>> {
        let slot = self.acquire(server, sample).await?;
        self.evaluate(slot, server, sample, accepted_at)
    }

    /// 校验采样并排队拿到键锁
    ///
    /// 调用方可以先拿锁、再做持久化等 I/O，最后调用 `evaluate`；
    /// 同一个键的采样按拿锁的先后生效。校验失败时不创建状态。
    pub async fn acquire(&self, server: &Server, sample: &MetricSample) -> Result<KeySlot> {
        let kind = sample.metric_kind();
        let value = sample.value();

        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(AlertError::InvalidMetricValue { kind, value });
        }
        // 先确认有阈值，避免为无效指标创建状态
        self.policy.load().policy.thresholds_for(kind)?;

        let key = AlertKey::new(server.id, kind);
        let guard = self.cell(key).lock_owned().await;
        Ok(KeySlot { key, guard })
    }

    /// 在已持有的键锁下推进状态机
    pub fn evaluate(
        &self,
        mut slot: KeySlot,
        server: &Server,
        sample: &MetricSample,
        accepted_at: DateTime<Utc>,
    ) -> Result<Option<AlertEvent>> {
        let kind = slot.key.metric_kind;
        let value = sample.value();
        let state = &mut *slot.guard;

        // 拿到锁之后再读快照，同一个键总是用不早于前一次的策略
        let snapshot = self.policy.load();
        let target = snapshot.policy.classify(kind, value)?;

        let Some(transition) = state.observe(target, &snapshot.debounce, accepted_at) else {
            debug!(
                server_id = %server.id,
                metric = %kind,
                value,
                level = %state.level,
                breach = state.consecutive_breach_count,
                clear = state.consecutive_clear_count,
                "Sample evaluated"
            );
            return Ok(None);
        };

        info!(
            server_id = %server.id,
            server_name = %server.name,
            metric = %kind,
            value,
            from = %transition.from,
            to = %transition.to,
            "Alert level changed"
        );

        Ok(Some(AlertEvent {
            server_id: server.id,
            server_name: server.name.clone(),
            metric_kind: kind,
            from_level: transition.from,
            to_level: transition.to,
            value,
            occurred_at: accepted_at,
        }))
    }

    /// 记录某个级别的通知已送达至少一个收件人
    pub async fn mark_notified(&self, key: AlertKey, level: AlertLevel) {
        let Some(cell) = self.states.get(&key).map(|r| r.value().clone()) else {
            return;
        };
        cell.lock().await.last_notified_level = Some(level);
    }

    /// 当前状态的拷贝
    pub async fn state_of(&self, key: AlertKey) -> Option<AlertState> {
        let cell = self.states.get(&key).map(|r| r.value().clone())?;
        let state = cell.lock().await;
        Some(state.clone())
    }

    /// 将状态重置为 Normal
    pub async fn reset(&self, key: AlertKey) {
        let Some(cell) = self.states.get(&key).map(|r| r.value().clone()) else {
            return;
        };
        *cell.lock().await = AlertState::default();
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// 取得（必要时创建）键对应的锁；返回前释放分片锁，不跨 await 持有
    fn cell(&self, key: AlertKey) -> Arc<Mutex<AlertState>> {
        self.states
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(AlertState::default())))
            .value()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostwatch_config::{DebounceConfig, PolicySnapshot, ThresholdPolicy, Thresholds};
    use std::time::Duration;

    fn tracker(breach: u32, clear: u32) -> AlertStateTracker {
        let policy = ThresholdPolicy::new()
            .with(MetricKind::Cpu, Thresholds::new(70.0, 85.0))
            .with(MetricKind::Memory, Thresholds::new(75.0, 90.0));
        let snapshot = PolicySnapshot::new(policy, DebounceConfig { breach, clear });
        AlertStateTracker::new(Arc::new(PolicyHandle::new(snapshot)))
    }

    fn server(id: i64) -> Server {
        Server::new(id, format!("srv-{}", id), format!("10.0.0.{}", id))
    }

    async fn feed(t: &AlertStateTracker, srv: &Server, kind: MetricKind, values: &[f64]) -> Vec<AlertEvent> {
        let mut events = Vec::new();
        for v in values {
            let sample = MetricSample::now(srv.ip_address.clone(), kind, *v);
            if let Some(event) = t.observe(srv, &sample).await.unwrap() {
                events.push(event);
            }
        }
        events
    }

    async fn level(t: &AlertStateTracker, srv: &Server, kind: MetricKind) -> AlertLevel {
        t.state_of(AlertKey::new(srv.id, kind)).await.unwrap().level
    }

    #[tokio::test]
    async fn test_constant_below_warning_stays_normal() {
        let t = tracker(2, 2);
        let srv = server(1);

        let events = feed(&t, &srv, MetricKind::Cpu, &[50.0; 200]).await;
        assert!(events.is_empty());
        assert_eq!(level(&t, &srv, MetricKind::Cpu).await, AlertLevel::Normal);
    }

    #[tokio::test]
    async fn test_single_spike_never_passes_warning() {
        let t = tracker(2, 2);
        let srv = server(1);

        // 一次极高值只能计数，不能越级
        let events = feed(&t, &srv, MetricKind::Cpu, &[100.0]).await;
        assert!(events.is_empty());
        assert_eq!(level(&t, &srv, MetricKind::Cpu).await, AlertLevel::Normal);

        let events = feed(&t, &srv, MetricKind::Cpu, &[100.0]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].to_level, AlertLevel::Warning);
    }

    #[tokio::test]
    async fn test_three_breaches_escalate_and_interruption_resets() {
        let t = tracker(3, 3);
        let srv = server(1);

        let events = feed(&t, &srv, MetricKind::Cpu, &[72.0, 75.0, 50.0]).await;
        assert!(events.is_empty());
        let state = t.state_of(AlertKey::new(srv.id, MetricKind::Cpu)).await.unwrap();
        assert_eq!(state.consecutive_breach_count, 0);

        let events = feed(&t, &srv, MetricKind::Cpu, &[72.0, 75.0, 71.0]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].from_level, AlertLevel::Normal);
        assert_eq!(events[0].to_level, AlertLevel::Warning);
    }

    #[tokio::test]
    async fn test_recovery_mirrors_escalation() {
        let t = tracker(2, 3);
        let srv = server(1);

        let events = feed(&t, &srv, MetricKind::Cpu, &[90.0, 90.0, 90.0, 90.0]).await;
        assert_eq!(events.len(), 2);
        assert_eq!(level(&t, &srv, MetricKind::Cpu).await, AlertLevel::Critical);

        // 三次 Warning 区间的采样：只回落一级
        let events = feed(&t, &srv, MetricKind::Cpu, &[75.0, 75.0, 75.0]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].from_level, AlertLevel::Critical);
        assert_eq!(events[0].to_level, AlertLevel::Warning);
        assert!(events[0].is_recovery());
        assert_eq!(level(&t, &srv, MetricKind::Cpu).await, AlertLevel::Warning);
    }

    #[tokio::test]
    async fn test_cpu_example_with_breach_two() {
        let t = tracker(2, 2);
        let srv = server(1);

        let events = feed(&t, &srv, MetricKind::Cpu, &[72.0]).await;
        assert!(events.is_empty());
        let events = feed(&t, &srv, MetricKind::Cpu, &[76.0]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].metric_kind, MetricKind::Cpu);
        assert_eq!(events[0].value, 76.0);

        let events = feed(&t, &srv, MetricKind::Cpu, &[90.0]).await;
        assert!(events.is_empty());
        assert_eq!(level(&t, &srv, MetricKind::Cpu).await, AlertLevel::Warning);

        let events = feed(&t, &srv, MetricKind::Cpu, &[88.0]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].to_level, AlertLevel::Critical);
    }

    #[tokio::test]
    async fn test_invalid_values_do_not_touch_state() {
        let t = tracker(2, 2);
        let srv = server(1);

        for bad in [-1.0, 100.5, f64::NAN, f64::INFINITY] {
            let sample = MetricSample::now(srv.ip_address.clone(), MetricKind::Cpu, bad);
            let err = t.observe(&srv, &sample).await.unwrap_err();
            assert!(matches!(err, AlertError::InvalidMetricValue { .. }));
        }
        assert!(t.is_empty());

        feed(&t, &srv, MetricKind::Cpu, &[80.0]).await;
        let sample = MetricSample::now(srv.ip_address.clone(), MetricKind::Cpu, 101.0);
        assert!(t.observe(&srv, &sample).await.is_err());
        let state = t.state_of(AlertKey::new(srv.id, MetricKind::Cpu)).await.unwrap();
        assert_eq!(state.consecutive_breach_count, 1);
    }

    #[tokio::test]
    async fn test_unknown_kind_rejected() {
        let t = tracker(2, 2);
        let srv = server(1);

        let sample = MetricSample::now(srv.ip_address.clone(), MetricKind::Disk, 95.0);
        let err = t.observe(&srv, &sample).await.unwrap_err();
        assert_eq!(err, AlertError::UnknownMetricKind(MetricKind::Disk));
        assert!(t.is_empty());
    }

    #[tokio::test]
    async fn test_one_state_per_key() {
        let t = tracker(2, 2);
        let srv = server(1);

        feed(&t, &srv, MetricKind::Cpu, &[10.0, 20.0]).await;
        feed(&t, &srv, MetricKind::Memory, &[10.0]).await;
        feed(&t, &server(2), MetricKind::Cpu, &[10.0]).await;
        assert_eq!(t.len(), 3);
    }

    #[tokio::test]
    async fn test_reset_returns_key_to_normal() {
        let t = tracker(2, 2);
        let srv = server(1);

        feed(&t, &srv, MetricKind::Cpu, &[90.0, 90.0, 90.0]).await;
        assert_eq!(level(&t, &srv, MetricKind::Cpu).await, AlertLevel::Warning);

        t.reset(AlertKey::new(srv.id, MetricKind::Cpu)).await;
        let state = t.state_of(AlertKey::new(srv.id, MetricKind::Cpu)).await.unwrap();
        assert_eq!(state, AlertState::default());
    }

    #[tokio::test]
    async fn test_locked_key_does_not_block_other_keys() {
        let t = Arc::new(tracker(2, 2));
        let a = server(1);
        let b = server(2);

        let guard = t.cell(AlertKey::new(a.id, MetricKind::Cpu)).lock_owned().await;

        let sample_b = MetricSample::now(b.ip_address.clone(), MetricKind::Cpu, 80.0);
        let result = tokio::time::timeout(Duration::from_millis(200), t.observe(&b, &sample_b)).await;
        assert!(result.is_ok(), "other key must not wait on the held lock");

        let sample_a = MetricSample::now(a.ip_address.clone(), MetricKind::Cpu, 80.0);
        let blocked = tokio::time::timeout(Duration::from_millis(50), t.observe(&a, &sample_a)).await;
        assert!(blocked.is_err(), "same key must wait for the lock");

        drop(guard);
        assert!(t.observe(&a, &sample_a).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_interleaved_streams_match_solo_processing() {
        let stream_a: Vec<f64> = vec![72.0, 80.0, 90.0, 91.0, 95.0, 40.0, 75.0, 76.0, 77.0, 20.0];
        let stream_b: Vec<f64> = vec![10.0, 88.0, 89.0, 50.0, 86.0, 87.0, 99.0, 98.0, 97.0, 96.0];

        // 单独处理得到的期望状态
        let solo = tracker(2, 2);
        feed(&solo, &server(1), MetricKind::Cpu, &stream_a).await;
        feed(&solo, &server(2), MetricKind::Cpu, &stream_b).await;
        let expected_a = solo.state_of(AlertKey::new(ServerId(1), MetricKind::Cpu)).await.unwrap();
        let expected_b = solo.state_of(AlertKey::new(ServerId(2), MetricKind::Cpu)).await.unwrap();

        let shared = Arc::new(tracker(2, 2));
        let mut handles = Vec::new();
        for (id, stream) in [(1, stream_a), (2, stream_b)] {
            let t = shared.clone();
            handles.push(tokio::spawn(async move {
                let srv = server(id);
                for v in stream {
                    let sample = MetricSample::now(srv.ip_address.clone(), MetricKind::Cpu, v);
                    t.observe(&srv, &sample).await.unwrap();
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let got_a = shared.state_of(AlertKey::new(ServerId(1), MetricKind::Cpu)).await.unwrap();
        let got_b = shared.state_of(AlertKey::new(ServerId(2), MetricKind::Cpu)).await.unwrap();
        assert_eq!(got_a.level, expected_a.level);
        assert_eq!(got_a.consecutive_breach_count, expected_a.consecutive_breach_count);
        assert_eq!(got_a.consecutive_clear_count, expected_a.consecutive_clear_count);
        assert_eq!(got_b.level, expected_b.level);
        assert_eq!(got_b.consecutive_breach_count, expected_b.consecutive_breach_count);
        assert_eq!(got_b.consecutive_clear_count, expected_b.consecutive_clear_count);
    }

    #[tokio::test]
    async fn test_policy_swap_applies_to_next_sample() {
        let t = tracker(2, 2);
        let srv = server(1);

        feed(&t, &srv, MetricKind::Cpu, &[60.0]).await;
        let next = ThresholdPolicy::new().with(MetricKind::Cpu, Thresholds::new(50.0, 95.0));
        t.policy.store(PolicySnapshot::new(next, DebounceConfig { breach: 2, clear: 2 }));

        let events = feed(&t, &srv, MetricKind::Cpu, &[60.0, 60.0]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].to_level, AlertLevel::Warning);
    }
}
