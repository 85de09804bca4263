use crate::dispatcher::{DispatchResult, NotificationDispatcher};
use crate::error::{NotifyError, Result};
use async_trait::async_trait;
use hostwatch_types::{AlertEvent, UserRef};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 待分发的告警
#[derive(Debug, Clone)]
pub struct DispatchJob {
    pub event: AlertEvent,
    pub recipients: BTreeSet<UserRef>,
}

/// 分发完成回调，在 worker 里按任务逐个调用
#[async_trait]
pub trait DispatchListener: Send + Sync {
    async fn dispatched(&self, event: &AlertEvent, result: &DispatchResult);
}

/// 有界分发队列
///
/// 固定数量的 worker 共享一个接收端。`submit` 不等待，队列满直接返回错误，
/// 慢速或不可达的邮件服务器不会拖住采样处理。
pub struct DispatchQueue {
    tx: RwLock<Option<mpsc::Sender<DispatchJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl DispatchQueue {
    pub fn start(dispatcher: Arc<NotificationDispatcher>, capacity: usize, workers: usize) -> Self {
        Self::start_with_listener(dispatcher, capacity, workers, None)
    }

    pub fn start_with_listener(
        dispatcher: Arc<NotificationDispatcher>,
        capacity: usize,
        workers: usize,
        listener: Option<Arc<dyn DispatchListener>>,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<DispatchJob>(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers.max(1))
            .map(|id| {
                let rx = rx.clone();
                let dispatcher = dispatcher.clone();
                let listener = listener.clone();
                tokio::spawn(async move {
                    loop {
                        let job = { rx.lock().await.recv().await };
                        let Some(job) = job else {
                            debug!(worker = id, "Dispatch worker exiting");
                            break;
                        };
                        let result = dispatcher.dispatch(&job.event, &job.recipients).await;
                        if let Some(listener) = &listener {
                            listener.dispatched(&job.event, &result).await;
                        }
                    }
                })
            })
            .collect();

        info!(capacity, workers, "Dispatch queue started");
        Self {
            tx: RwLock::new(Some(tx)),
            workers: Mutex::new(handles),
        }
    }

    /// 提交告警，不等待投递
    pub async fn submit(&self, job: DispatchJob) -> Result<()> {
        let guard = self.tx.read().await;
        let Some(tx) = guard.as_ref() else {
            return Err(NotifyError::QueueClosed);
        };

        match tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                warn!(
                    server_id = %job.event.server_id,
                    metric = %job.event.metric_kind,
                    level = %job.event.to_level,
                    "Dispatch queue full, alert dropped"
                );
                Err(NotifyError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(NotifyError::QueueClosed),
        }
    }

    /// 关闭队列并等待 worker 处理完已入队的任务
    pub async fn shutdown(&self) {
        self.tx.write().await.take();

        let handles: Vec<_> = self.workers.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Dispatch worker panicked");
            }
        }
        info!("Dispatch queue stopped");
    }
}
