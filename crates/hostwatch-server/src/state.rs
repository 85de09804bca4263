use hostwatch_config::AppConfig;
use hostwatch_core::IngestionCoordinator;
use std::sync::Arc;
use tokio::sync::watch;

/// API 共享状态
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<IngestionCoordinator>,
    /// 热加载后的最新配置，API 密钥从这里读取
    pub config: watch::Receiver<AppConfig>,
}

impl AppState {
    pub fn new(coordinator: Arc<IngestionCoordinator>, config: watch::Receiver<AppConfig>) -> Self {
        Self {
            coordinator,
            config,
        }
    }

    pub fn is_valid_key(&self, key: &str) -> bool {
        self.config.borrow().auth.api_keys.iter().any(|k| k == key)
    }
}
