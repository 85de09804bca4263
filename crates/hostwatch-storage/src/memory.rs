use crate::error::Result;
use crate::model::StoredSample;
use crate::store::SampleStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hostwatch_types::ServerId;
use tokio::sync::RwLock;

/// 内存采样存储
#[derive(Default)]
pub struct MemorySampleStore {
    samples: RwLock<Vec<StoredSample>>,
}

impl MemorySampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.samples.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.samples.read().await.is_empty()
    }

    pub async fn all(&self) -> Vec<StoredSample> {
        self.samples.read().await.clone()
    }
}

#[async_trait]
impl SampleStore for MemorySampleStore {
    async fn append(&self, sample: StoredSample) -> Result<()> {
        self.samples.write().await.push(sample);
        Ok(())
    }

    async fn latest_for_server(&self, server_id: ServerId) -> Result<Option<StoredSample>> {
        let samples = self.samples.read().await;
        Ok(samples
            .iter()
            .rev()
            .find(|s| s.server_id == Some(server_id))
            .cloned())
    }

    async fn query(&self, server_ip: &str, since: DateTime<Utc>) -> Result<Vec<StoredSample>> {
        let samples = self.samples.read().await;
        Ok(samples
            .iter()
            .filter(|s| s.server_ip == server_ip && s.accepted_at >= since)
            .cloned()
            .collect())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut samples = self.samples.write().await;
        let before = samples.len();
        samples.retain(|s| s.accepted_at >= cutoff);
        Ok((before - samples.len()) as u64)
    }
}
