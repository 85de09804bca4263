use crate::error::Result;
use crate::submission::{BatchOutcome, MetricOutcome, Submission};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hostwatch_alert::{AlertError, AlertKey, AlertStateTracker};
use hostwatch_directory::{LivenessMonitor, ServerDirectory};
use hostwatch_notify::{DispatchJob, DispatchListener, DispatchQueue, DispatchResult};
use hostwatch_storage::{SampleStore, StoredSample};
use hostwatch_types::{AlertEvent, MetricSample, Server, ServerId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 单个采样的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum IngestResult {
    /// IP 没有登记，采样已作为未归属数据保存
    ServerUnmatched,
    Recorded {
        server_id: ServerId,
        /// 评估被拒绝的原因，采样仍已保存
        rejected: Option<AlertError>,
        event: Option<AlertEvent>,
    },
}

/// 摄取协调器
///
/// 解析服务器 -> 拿键锁 -> 保存原始采样 -> 刷新存活状态 -> 告警评估 -> 事件入队。
/// 键锁在任何 I/O 之前拿到，同一个键的采样按接受顺序生效，
/// 与存储的快慢无关。投递在分发队列里异步完成，这里不等待。
pub struct IngestionCoordinator {
    directory: Arc<dyn ServerDirectory>,
    store: Arc<dyn SampleStore>,
    tracker: Arc<AlertStateTracker>,
    liveness: Arc<LivenessMonitor>,
    queue: Arc<DispatchQueue>,
}

impl IngestionCoordinator {
    pub fn new(
        directory: Arc<dyn ServerDirectory>,
        store: Arc<dyn SampleStore>,
        tracker: Arc<AlertStateTracker>,
        liveness: Arc<LivenessMonitor>,
        queue: Arc<DispatchQueue>,
    ) -> Self {
        Self {
            directory,
            store,
            tracker,
            liveness,
            queue,
        }
    }

    pub fn tracker(&self) -> &Arc<AlertStateTracker> {
        &self.tracker
    }

    pub async fn ingest(&self, sample: MetricSample) -> Result<IngestResult> {
        let server = self.directory.resolve(sample.server_ip()).await?;
        self.ingest_resolved(server.as_ref(), &sample, Utc::now()).await
    }

    /// 处理一次提交，服务器只解析一次；单个指标失败不影响其它指标
    pub async fn ingest_batch(&self, submission: &Submission) -> Result<BatchOutcome> {
        let server = match submission.server_id {
            Some(server_id) => {
                let server = self.directory.get(server_id).await?;
                if server.is_none() {
                    debug!(server_id = %server_id, "No server registered for id");
                }
                server
            }
            None => self.directory.resolve(&submission.ip_address).await?,
        };
        let server_ip = server
            .as_ref()
            .map_or(submission.ip_address.as_str(), |s| s.ip_address.as_str());
        let now = Utc::now();

        let mut metrics = Vec::new();
        for sample in submission.samples_for(server_ip, now) {
            let kind = sample.metric_kind();
            let result = self.ingest_resolved(server.as_ref(), &sample, Utc::now()).await?;
            let outcome = match result {
                IngestResult::Recorded {
                    rejected: Some(err),
                    ..
                } => MetricOutcome {
                    metric: kind,
                    accepted: false,
                    reason: Some(err.to_string()),
                },
                _ => MetricOutcome {
                    metric: kind,
                    accepted: true,
                    reason: None,
                },
            };
            metrics.push(outcome);
        }

        Ok(BatchOutcome {
            server_matched: server.is_some(),
            metrics,
        })
    }

    async fn ingest_resolved(
        &self,
        server: Option<&Server>,
        sample: &MetricSample,
        accepted_at: DateTime<Utc>,
    ) -> Result<IngestResult> {
        let Some(server) = server else {
            self.store
                .append(StoredSample::from_sample(sample, None, accepted_at))
                .await?;
            info!(
                ip = %sample.server_ip(),
                metric = %sample.metric_kind(),
                "Sample from unregistered ip recorded as unassigned"
            );
            return Ok(IngestResult::ServerUnmatched);
        };

        // 在任何 I/O 之前排队拿键锁
        let slot = self.tracker.acquire(server, sample).await;

        self.store
            .append(StoredSample::from_sample(sample, Some(server.id), accepted_at))
            .await?;

        if let Err(e) = self.liveness.touch(server, accepted_at).await {
            warn!(server_id = %server.id, error = %e, "Failed to update server liveness");
        }

        let evaluated = slot.and_then(|slot| self.tracker.evaluate(slot, server, sample, accepted_at));
        let event = match evaluated {
            Ok(event) => event,
            Err(err) => {
                warn!(
                    server_id = %server.id,
                    ip = %sample.server_ip(),
                    metric = %sample.metric_kind(),
                    value = sample.value(),
                    error = %err,
                    "Sample rejected by alert evaluation"
                );
                return Ok(IngestResult::Recorded {
                    server_id: server.id,
                    rejected: Some(err),
                    event: None,
                });
            }
        };

        if let Some(event) = &event {
            self.enqueue(event).await;
        }

        Ok(IngestResult::Recorded {
            server_id: server.id,
            rejected: None,
            event,
        })
    }

    async fn enqueue(&self, event: &AlertEvent) {
        let recipients = match self.directory.recipients_of(event.server_id).await {
            Ok(recipients) => recipients,
            Err(e) => {
                warn!(server_id = %event.server_id, error = %e, "Failed to look up alert recipients");
                return;
            }
        };

        let job = DispatchJob {
            event: event.clone(),
            recipients,
        };
        match self.queue.submit(job).await {
            Ok(()) => debug!(
                server_id = %event.server_id,
                metric = %event.metric_kind,
                level = %event.to_level,
                "Alert event queued for dispatch"
            ),
            Err(e) => warn!(
                server_id = %event.server_id,
                metric = %event.metric_kind,
                error = %e,
                "Alert event not queued"
            ),
        }
    }
}

/// 把送达结果写回告警状态的 `last_notified_level`
pub struct NotifiedLevelRecorder {
    tracker: Arc<AlertStateTracker>,
}

impl NotifiedLevelRecorder {
    pub fn new(tracker: Arc<AlertStateTracker>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl DispatchListener for NotifiedLevelRecorder {
    async fn dispatched(&self, event: &AlertEvent, result: &DispatchResult) {
        if result.delivered() == 0 {
            return;
        }
        self.tracker
            .mark_notified(AlertKey::new(event.server_id, event.metric_kind), event.to_level)
            .await;
    }
}
