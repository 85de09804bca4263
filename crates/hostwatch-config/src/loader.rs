use crate::app::AppConfig;
use crate::error::{ConfigError, Result};
use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};

/// 配置加载器
///
/// 读取 TOML 文件，再叠加 `HOSTWATCH__<SECTION>__<KEY>` 形式的环境变量。
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 加载配置（不校验）；文件不存在时使用默认配置
    pub fn load(&self) -> Result<AppConfig> {
        let mut builder = Config::builder();

        if self.path.exists() {
            let path = self
                .path
                .to_str()
                .ok_or_else(|| ConfigError::invalid("Invalid config path"))?;
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else {
            tracing::warn!(path = %self.path.display(), "Config file not found, using defaults");
        }

        let config = builder
            .add_source(
                Environment::with_prefix("HOSTWATCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// 从字符串解析，供数据库或测试使用
    pub fn parse_str(content: &str) -> Result<AppConfig> {
        let config = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// 加载并校验
    pub fn load_validated(&self) -> Result<AppConfig> {
        let config = self.load()?;
        config.validate()?;
        Ok(config)
    }
}
