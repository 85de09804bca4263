use crate::error::Result;
use crate::model::StoredSample;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hostwatch_types::ServerId;

/// 采样存储 trait，只追加
#[async_trait]
pub trait SampleStore: Send + Sync {
    async fn append(&self, sample: StoredSample) -> Result<()>;

    /// 服务器最近一次被接受的采样
    async fn latest_for_server(&self, server_id: ServerId) -> Result<Option<StoredSample>>;

    /// 按 IP 查询 `since` 之后接受的采样，按接受顺序返回
    async fn query(&self, server_ip: &str, since: DateTime<Utc>) -> Result<Vec<StoredSample>>;

    /// 删除 `cutoff` 之前接受的采样，返回删除条数
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
