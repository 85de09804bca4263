use crate::error::{Result, StorageError};
use crate::model::StoredSample;
use crate::store::SampleStore;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use hostwatch_types::{MetricKind, ServerId};
use sea_orm::{
    ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, QueryResult, Statement, Value,
};
use std::sync::Arc;
use tracing::{debug, info};

const COLUMNS: &str = "server_id, server_ip, metric_kind, value, observed_at, accepted_at";

/// 基于 sea-orm 的采样存储（SQLite / PostgreSQL）
///
/// 时间戳以毫秒整数保存，两种后端行为一致。
pub struct SqlSampleStore {
    db: Arc<DatabaseConnection>,
}

impl SqlSampleStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = Database::connect(database_url).await?;
        info!(backend = ?db.get_database_backend(), "Connected to sample database");

        let store = Self { db: Arc::new(db) };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// 建表，可重复执行
    pub async fn ensure_schema(&self) -> Result<()> {
        let backend = self.backend();
        let id_column = match backend {
            DatabaseBackend::Postgres => "id BIGSERIAL PRIMARY KEY",
            _ => "id INTEGER PRIMARY KEY AUTOINCREMENT",
        };

        self.db
            .execute(Statement::from_string(
                backend,
                format!(
                    r#"
                    CREATE TABLE IF NOT EXISTS monitor_samples (
                        {},
                        server_id BIGINT,
                        server_ip TEXT NOT NULL,
                        metric_kind TEXT NOT NULL,
                        value DOUBLE PRECISION NOT NULL,
                        observed_at BIGINT NOT NULL,
                        accepted_at BIGINT NOT NULL
                    )
                    "#,
                    id_column
                ),
            ))
            .await?;

        self.db
            .execute(Statement::from_string(
                backend,
                "CREATE INDEX IF NOT EXISTS idx_monitor_samples_ip ON monitor_samples (server_ip, accepted_at)"
                    .to_string(),
            ))
            .await?;
        self.db
            .execute(Statement::from_string(
                backend,
                "CREATE INDEX IF NOT EXISTS idx_monitor_samples_server ON monitor_samples (server_id, id)"
                    .to_string(),
            ))
            .await?;

        debug!("Sample schema ensured");
        Ok(())
    }

    fn backend(&self) -> DatabaseBackend {
        self.db.get_database_backend()
    }

    /// 第 `idx` 个参数的占位符
    fn param(&self, idx: usize) -> String {
        match self.backend() {
            DatabaseBackend::Postgres => format!("${}", idx),
            _ => "?".to_string(),
        }
    }

    fn statement(&self, sql: String, values: Vec<Value>) -> Statement {
        Statement::from_sql_and_values(self.backend(), sql, values)
    }
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StorageError::Corrupt(format!("timestamp {}", ms)))
}

fn row_to_sample(row: &QueryResult) -> Result<StoredSample> {
    let kind: String = row.try_get("", "metric_kind")?;
    let metric_kind: MetricKind = kind
        .parse()
        .map_err(|_| StorageError::Corrupt(format!("metric kind {}", kind)))?;

    Ok(StoredSample {
        server_id: row.try_get::<Option<i64>>("", "server_id")?.map(ServerId),
        server_ip: row.try_get("", "server_ip")?,
        metric_kind,
        value: row.try_get("", "value")?,
        observed_at: from_millis(row.try_get("", "observed_at")?)?,
        accepted_at: from_millis(row.try_get("", "accepted_at")?)?,
    })
}

#[async_trait]
impl SampleStore for SqlSampleStore {
    async fn append(&self, sample: StoredSample) -> Result<()> {
        let sql = format!(
            "INSERT INTO monitor_samples ({}) VALUES ({}, {}, {}, {}, {}, {})",
            COLUMNS,
            self.param(1),
            self.param(2),
            self.param(3),
            self.param(4),
            self.param(5),
            self.param(6),
        );

        let stmt = self.statement(
            sql,
            vec![
                sample.server_id.map(|id| id.0).into(),
                sample.server_ip.clone().into(),
                sample.metric_kind.as_str().into(),
                sample.value.into(),
                to_millis(sample.observed_at).into(),
                to_millis(sample.accepted_at).into(),
            ],
        );
        self.db.execute(stmt).await?;

        debug!(
            server_ip = %sample.server_ip,
            metric = %sample.metric_kind,
            unassigned = sample.is_unassigned(),
            "Sample stored"
        );
        Ok(())
    }

    async fn latest_for_server(&self, server_id: ServerId) -> Result<Option<StoredSample>> {
        let sql = format!(
            "SELECT {} FROM monitor_samples WHERE server_id = {} ORDER BY id DESC LIMIT 1",
            COLUMNS,
            self.param(1)
        );
        let row = self
            .db
            .query_one(self.statement(sql, vec![server_id.0.into()]))
            .await?;

        row.as_ref().map(row_to_sample).transpose()
    }

    async fn query(&self, server_ip: &str, since: DateTime<Utc>) -> Result<Vec<StoredSample>> {
        let sql = format!(
            "SELECT {} FROM monitor_samples WHERE server_ip = {} AND accepted_at >= {} ORDER BY id ASC",
            COLUMNS,
            self.param(1),
            self.param(2)
        );
        let rows = self
            .db
            .query_all(self.statement(sql, vec![server_ip.into(), to_millis(since).into()]))
            .await?;

        let samples = rows.iter().map(row_to_sample).collect::<Result<Vec<_>>>()?;
        debug!(server_ip = %server_ip, count = samples.len(), "Queried samples");
        Ok(samples)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let sql = format!(
            "DELETE FROM monitor_samples WHERE accepted_at < {}",
            self.param(1)
        );
        let result = self
            .db
            .execute(self.statement(sql, vec![to_millis(cutoff).into()]))
            .await?;
        Ok(result.rows_affected())
    }
}
