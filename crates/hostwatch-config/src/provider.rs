use crate::app::AppConfig;
use crate::loader::ConfigLoader;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

#[async_trait]
pub trait ConfigProvider: Send + Sync {
    async fn load(&self) -> Result<AppConfig>;

    /// 用于检测配置是否变更的版本号（变化即可）
    async fn version(&self) -> Result<i64>;
}

pub struct FileConfigProvider {
    path: PathBuf,
}

impl FileConfigProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConfigProvider for FileConfigProvider {
    async fn load(&self) -> Result<AppConfig> {
        Ok(ConfigLoader::new(&self.path).load()?)
    }

    async fn version(&self) -> Result<i64> {
        let meta = std::fs::metadata(&self.path)
            .map_err(|e| anyhow!("Failed to read config metadata {}: {}", self.path.display(), e))?;
        let modified = meta
            .modified()
            .map_err(|e| anyhow!("Failed to read config mtime {}: {}", self.path.display(), e))?;
        let ms = modified
            .duration_since(UNIX_EPOCH)
            .map_err(|e| anyhow!("Invalid mtime for {}: {}", self.path.display(), e))?
            .as_millis();
        Ok(ms as i64)
    }
}
