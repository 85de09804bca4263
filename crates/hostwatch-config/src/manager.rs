use crate::app::AppConfig;
use crate::policy::PolicyHandle;
use crate::provider::ConfigProvider;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

/// 配置热加载管理器
///
/// 轮询 provider 的版本号，变化时重新加载并校验；校验通过后整体替换策略快照。
/// 监听地址、数据库等启动期配置需要重启才生效。
pub struct ConfigManager {
    provider: Arc<dyn ConfigProvider>,
    policy: Arc<PolicyHandle>,
    tx: watch::Sender<AppConfig>,
    version: RwLock<i64>,
}

impl ConfigManager {
    pub fn new(
        provider: Arc<dyn ConfigProvider>,
        initial: AppConfig,
        version: i64,
        policy: Arc<PolicyHandle>,
    ) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            provider,
            policy,
            tx,
            version: RwLock::new(version),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AppConfig> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> AppConfig {
        self.tx.borrow().clone()
    }

    pub fn policy(&self) -> Arc<PolicyHandle> {
        self.policy.clone()
    }

    /// 检查一次版本，变化则重新加载。返回是否应用了新配置
    pub async fn reload_if_changed(&self) -> bool {
        let new_ver = match self.provider.version().await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Config version check failed: {}", e);
                return false;
            }
        };

        let mut ver_guard = self.version.write().await;
        if new_ver == *ver_guard {
            return false;
        }
        // 无论成功与否都记下版本，避免对同一份坏配置反复报错
        *ver_guard = new_ver;

        let cfg = match self.provider.load().await {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!("Config reload failed (version={}): {}", new_ver, e);
                return false;
            }
        };

        if let Err(e) = cfg.validate() {
            tracing::warn!("Rejected invalid config (version={}): {}", new_ver, e);
            return false;
        }

        let policy_version = self.policy.store(cfg.policy_snapshot());
        let _ = self.tx.send(cfg);
        tracing::info!(
            version = new_ver,
            policy_version,
            "Config reloaded, threshold policy swapped"
        );
        true
    }

    pub fn start_polling(self: Arc<Self>, interval: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.reload_if_changed().await;
            }
        })
    }
}
