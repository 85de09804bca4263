use crate::error::{ConfigError, Result};
use crate::policy::{PolicySnapshot, ThresholdPolicy, Thresholds};
use hostwatch_types::{MetricKind, Server, UserRef};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: HttpConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    #[serde(default)]
    pub debounce: DebounceConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub liveness: LivenessConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 预置服务器目录（服务器增删改由外部系统负责）
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// 采集端使用的预共享 API 密钥
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub api_keys: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    /// 为空时使用内存存储
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ThresholdsConfig {
    #[serde(default = "default_cpu_thresholds")]
    pub cpu: Thresholds,
    #[serde(default = "default_memory_thresholds")]
    pub memory: Thresholds,
    #[serde(default = "default_disk_thresholds")]
    pub disk: Thresholds,
}

/// 去抖计数：连续多少次越限/恢复才迁移一级
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct DebounceConfig {
    #[serde(default = "default_debounce")]
    pub breach: u32,
    #[serde(default = "default_debounce")]
    pub clear: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotifyConfig {
    /// 相同 (服务器, 指标, 级别) 通知的冷却时间
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmtpConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub sender: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LivenessConfig {
    /// 超过此时间未收到采样则标记离线
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "text" 或 "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerEntry {
    pub id: i64,
    pub name: String,
    pub ip_address: String,
    #[serde(default)]
    pub recipients: Vec<UserRef>,
}

// 默认值函数
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cpu_thresholds() -> Thresholds {
    Thresholds::new(70.0, 85.0)
}

fn default_memory_thresholds() -> Thresholds {
    Thresholds::new(75.0, 90.0)
}

fn default_disk_thresholds() -> Thresholds {
    Thresholds::new(80.0, 90.0)
}

fn default_debounce() -> u32 {
    3
}

fn default_cooldown_secs() -> u64 {
    1800
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_workers() -> usize {
    2
}

fn default_smtp_port() -> u16 {
    465
}

fn default_staleness_secs() -> u64 {
    120
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_retention_days() -> u64 {
    7
}

fn default_purge_interval_secs() -> u64 {
    3600
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// Default trait 实现
impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            cpu: default_cpu_thresholds(),
            memory: default_memory_thresholds(),
            disk: default_disk_thresholds(),
        }
    }
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            breach: default_debounce(),
            clear: default_debounce(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            queue_capacity: default_queue_capacity(),
            workers: default_workers(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            sender: String::new(),
        }
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            staleness_secs: default_staleness_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            purge_interval_secs: default_purge_interval_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl ThresholdsConfig {
    pub fn to_policy(&self) -> ThresholdPolicy {
        ThresholdPolicy::new()
            .with(MetricKind::Cpu, self.cpu)
            .with(MetricKind::Memory, self.memory)
            .with(MetricKind::Disk, self.disk)
    }
}

impl NotifyConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl LivenessConfig {
    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.staleness_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl ServerEntry {
    pub fn to_server(&self) -> Server {
        let mut server = Server::new(self.id, self.name.clone(), self.ip_address.clone());
        server.recipients = self.recipients.iter().cloned().collect();
        server
    }
}

impl AppConfig {
    /// 当前配置对应的策略快照
    pub fn policy_snapshot(&self) -> PolicySnapshot {
        PolicySnapshot::new(self.thresholds.to_policy(), self.debounce)
    }

    /// 启动前校验，失败即致命
    pub fn validate(&self) -> Result<()> {
        self.thresholds.to_policy().validate()?;

        if self.debounce.breach < 2 || self.debounce.clear < 2 {
            return Err(ConfigError::invalid(format!(
                "debounce counts must be at least 2 (breach={}, clear={})",
                self.debounce.breach, self.debounce.clear
            )));
        }

        if self.auth.api_keys.iter().all(|k| k.trim().is_empty()) {
            return Err(ConfigError::invalid("auth.api_keys must contain at least one key"));
        }

        if self.notify.max_attempts == 0 {
            return Err(ConfigError::invalid("notify.max_attempts must be greater than 0"));
        }
        if self.notify.queue_capacity == 0 || self.notify.workers == 0 {
            return Err(ConfigError::invalid(
                "notify.queue_capacity and notify.workers must be greater than 0",
            ));
        }
        if self.notify.initial_backoff_ms > self.notify.max_backoff_ms {
            return Err(ConfigError::invalid(format!(
                "notify.initial_backoff_ms ({}) cannot be greater than notify.max_backoff_ms ({})",
                self.notify.initial_backoff_ms, self.notify.max_backoff_ms
            )));
        }

        if self.liveness.staleness_secs == 0 || self.liveness.sweep_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "liveness.staleness_secs and liveness.sweep_interval_secs must be greater than 0",
            ));
        }

        if self.storage.retention_days == 0 || self.storage.purge_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "storage.retention_days and storage.purge_interval_secs must be greater than 0",
            ));
        }

        if self.smtp.enabled && (self.smtp.host.is_empty() || self.smtp.sender.is_empty()) {
            return Err(ConfigError::invalid("smtp.host and smtp.sender are required when smtp is enabled"));
        }

        let mut ips = HashSet::new();
        let mut ids = HashSet::new();
        for entry in &self.servers {
            if !ips.insert(entry.ip_address.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "duplicate server ip_address: {}",
                    entry.ip_address
                )));
            }
            if !ids.insert(entry.id) {
                return Err(ConfigError::invalid(format!("duplicate server id: {}", entry.id)));
            }
        }

        Ok(())
    }
}
