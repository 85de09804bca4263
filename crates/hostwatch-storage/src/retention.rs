use crate::error::Result;
use crate::store::SampleStore;
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const MAX_RETENTION_DAYS: u64 = 36_500;

/// 采样保留期清理任务
pub struct RetentionTask {
    store: Arc<dyn SampleStore>,
    retention: Duration,
    running: AtomicBool,
}

impl RetentionTask {
    pub fn new(store: Arc<dyn SampleStore>, retention_days: u64) -> Self {
        Self {
            store,
            retention: Duration::days(retention_days.min(MAX_RETENTION_DAYS) as i64),
            running: AtomicBool::new(false),
        }
    }

    /// 执行一次清理
    pub async fn run_once(&self) -> Result<u64> {
        let cutoff = Utc::now() - self.retention;
        let deleted = self.store.purge_older_than(cutoff).await?;
        if deleted > 0 {
            info!(deleted, cutoff = %cutoff, "Expired samples purged");
        }
        Ok(deleted)
    }

    pub fn start(self: &Arc<Self>, interval: std::time::Duration) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        info!(
            retention_days = self.retention.num_days(),
            interval = ?interval,
            "Retention task started"
        );

        let task = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if !task.running.load(Ordering::SeqCst) {
                    info!("Retention task stopped");
                    break;
                }
                if let Err(e) = task.run_once().await {
                    warn!(error = %e, "Sample purge failed");
                }
            }
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
