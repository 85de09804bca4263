use anyhow::Context;
use hostwatch_alert::AlertStateTracker;
use hostwatch_config::{AppConfig, PolicyHandle};
use hostwatch_core::{IngestionCoordinator, NotifiedLevelRecorder};
use hostwatch_directory::{InMemoryDirectory, LivenessMonitor};
use hostwatch_notify::{
    DispatchListener, DispatchQueue, LogTransport, MailTransport, NotificationDispatcher, SmtpMailTransport,
};
use hostwatch_storage::{MemorySampleStore, RetentionTask, SampleStore, SqlSampleStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// 冷却账本清理间隔
const LEDGER_PURGE_INTERVAL: Duration = Duration::from_secs(600);

/// 运行期组件
pub struct Services {
    pub coordinator: Arc<IngestionCoordinator>,
    pub directory: Arc<InMemoryDirectory>,
    pub tracker: Arc<AlertStateTracker>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub queue: Arc<DispatchQueue>,
    pub liveness: Arc<LivenessMonitor>,
    pub retention: Arc<RetentionTask>,
    tasks: Vec<JoinHandle<()>>,
}

impl Services {
    /// 按配置装配各组件（不启动后台任务）
    pub async fn build(config: &AppConfig, policy: Arc<PolicyHandle>) -> anyhow::Result<Self> {
        let store: Arc<dyn SampleStore> = match &config.database.url {
            Some(url) => Arc::new(
                SqlSampleStore::connect(url)
                    .await
                    .context("Failed to open sample database")?,
            ),
            None => {
                info!("No database configured, samples kept in memory");
                Arc::new(MemorySampleStore::new())
            }
        };

        let directory = Arc::new(
            InMemoryDirectory::from_servers(config.servers.iter().map(|s| s.to_server()))
                .context("Failed to seed server directory")?,
        );

        let transport: Arc<dyn MailTransport> = if config.smtp.enabled {
            Arc::new(SmtpMailTransport::from_config(&config.smtp)?)
        } else {
            info!("SMTP disabled, notifications will only be logged");
            Arc::new(LogTransport)
        };

        let tracker = Arc::new(AlertStateTracker::new(policy.clone()));
        let dispatcher = Arc::new(NotificationDispatcher::from_config(
            transport,
            policy,
            &config.notify,
        ));
        let recorder: Arc<dyn DispatchListener> = Arc::new(NotifiedLevelRecorder::new(tracker.clone()));
        let queue = Arc::new(DispatchQueue::start_with_listener(
            dispatcher.clone(),
            config.notify.queue_capacity,
            config.notify.workers,
            Some(recorder),
        ));
        let liveness = Arc::new(LivenessMonitor::new(
            directory.clone(),
            config.liveness.staleness(),
        ));
        let retention = Arc::new(RetentionTask::new(store.clone(), config.storage.retention_days));

        let coordinator = Arc::new(IngestionCoordinator::new(
            directory.clone(),
            store,
            tracker.clone(),
            liveness.clone(),
            queue.clone(),
        ));

        info!(servers = directory.len(), "Services initialized");
        Ok(Self {
            coordinator,
            directory,
            tracker,
            dispatcher,
            queue,
            liveness,
            retention,
            tasks: Vec::new(),
        })
    }

    /// 启动存活巡检、保留期清理和冷却账本清理
    pub fn start_background(&mut self, config: &AppConfig) {
        self.tasks
            .push(self.liveness.start(config.liveness.sweep_interval()));
        self.tasks.push(
            self.retention
                .start(Duration::from_secs(config.storage.purge_interval_secs)),
        );

        let dispatcher = self.dispatcher.clone();
        self.tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(LEDGER_PURGE_INTERVAL);
            loop {
                ticker.tick().await;
                let purged = dispatcher.ledger().purge_expired(chrono::Utc::now());
                tracing::debug!(purged, "Cooldown ledger purged");
            }
        }));
    }

    /// 停止后台任务并关闭分发队列
    pub async fn shutdown(mut self, drain_timeout: Duration) {
        self.liveness.stop();
        self.retention.stop();
        for task in self.tasks.drain(..) {
            task.abort();
        }

        // 超时未投递完的通知直接放弃
        if tokio::time::timeout(drain_timeout, self.queue.shutdown())
            .await
            .is_err()
        {
            tracing::warn!("Dispatch queue did not drain in time, pending notifications abandoned");
        }
        info!("Services stopped");
    }
}
