use crate::directory::ServerDirectory;
use crate::error::{DirectoryError, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hostwatch_types::{Server, ServerId, ServerStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// 服务器存活监控
///
/// 每次匹配成功的采样都会刷新最后上报时间；后台任务定期把超过
/// `staleness` 未上报的在线服务器标记为离线。
pub struct LivenessMonitor {
    directory: Arc<dyn ServerDirectory>,

    /// 超时时间（超过此时间未收到采样则认为离线）
    staleness: Duration,

    /// 服务器最后一次被接受的采样时间
    last_seen: DashMap<ServerId, DateTime<Utc>>,

    running: AtomicBool,
}

impl LivenessMonitor {
    pub fn new(directory: Arc<dyn ServerDirectory>, staleness: Duration) -> Self {
        Self {
            directory,
            staleness,
            last_seen: DashMap::new(),
            running: AtomicBool::new(false),
        }
    }

    /// 记录一次采样，离线服务器切回在线。返回是否发生了切换
    ///
    /// 状态以目录为准，`server` 只是解析时的快照。
    pub async fn touch(&self, server: &Server, now: DateTime<Utc>) -> Result<bool> {
        self.last_seen.insert(server.id, now);

        let previous = self.directory.set_status(server.id, ServerStatus::Online).await?;
        if previous != ServerStatus::Online {
            info!(server_id = %server.id, server_name = %server.name, "Server came online");
            return Ok(true);
        }
        Ok(false)
    }

    pub fn last_seen(&self, server_id: ServerId) -> Option<DateTime<Utc>> {
        self.last_seen.get(&server_id).map(|r| *r.value())
    }

    /// 检查一次超时，返回被标记为离线的服务器
    pub async fn sweep(&self, now: DateTime<Utc>) -> Vec<ServerId> {
        let staleness = chrono::Duration::from_std(self.staleness)
            .unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX / 1000));

        // 先拷贝出超时列表，避免在 await 期间持有分片锁
        let stale: Vec<ServerId> = self
            .last_seen
            .iter()
            .filter(|entry| now.signed_duration_since(*entry.value()) > staleness)
            .map(|entry| *entry.key())
            .collect();

        let mut flipped = Vec::new();
        for server_id in stale {
            match self.directory.set_status(server_id, ServerStatus::Offline).await {
                Ok(ServerStatus::Online) => {
                    warn!(server_id = %server_id, "Server went offline (no samples within staleness window)");
                    flipped.push(server_id);
                }
                Ok(ServerStatus::Offline) => {}
                Err(DirectoryError::NotFound(_)) => {
                    debug!(server_id = %server_id, "Server no longer registered, dropping liveness entry");
                }
                Err(e) => {
                    // 保留记录，下次巡检重试
                    warn!(server_id = %server_id, error = %e, "Failed to mark server offline");
                    continue;
                }
            }
            // 巡检期间又收到采样的不删
            self.last_seen
                .remove_if(&server_id, |_, seen| now.signed_duration_since(*seen) > staleness);
        }

        debug!(checked = self.last_seen.len(), offline = flipped.len(), "Liveness sweep finished");
        flipped
    }

    /// 启动后台巡检任务
    pub fn start(self: &Arc<Self>, sweep_interval: Duration) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        info!(
            staleness = ?self.staleness,
            sweep_interval = ?sweep_interval,
            "Liveness monitor started"
        );

        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(sweep_interval);
            loop {
                ticker.tick().await;
                if !monitor.running.load(Ordering::SeqCst) {
                    info!("Liveness monitor stopped");
                    break;
                }
                monitor.sweep(Utc::now()).await;
            }
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!("Liveness monitor stopping...");
    }
}
