use crate::cooldown::{CooldownLedger, NotificationRecord};
use crate::error::TransportError;
use crate::message::render;
use crate::transport::MailTransport;
use chrono::Utc;
use exponential_backoff::Backoff;
use hostwatch_config::{NotifyConfig, PolicyHandle};
use hostwatch_types::{AlertEvent, UserRef};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 投递重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    max_delay: Duration,
    backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial: Duration, max: Duration) -> Self {
        let max_attempts = max_attempts.max(1);
        Self {
            max_attempts,
            max_delay: max,
            backoff: Backoff::new(max_attempts, initial, Some(max)),
        }
    }

    pub fn from_config(config: &NotifyConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.initial_backoff(),
            config.max_backoff(),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 第 `attempt` 次失败之后的等待时间
    fn delay(&self, attempt: u32) -> Duration {
        self.backoff
            .next(attempt)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// 单个接收人的投递结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientOutcome {
    Delivered { attempts: u32 },
    /// 冷却期内已发送过
    Suppressed,
    Failed { attempts: u32, error: TransportError },
}

/// 一次分发的结果
#[derive(Debug, Clone, Default)]
pub struct DispatchResult {
    pub outcomes: Vec<(UserRef, RecipientOutcome)>,
}

impl DispatchResult {
    pub fn delivered(&self) -> usize {
        self.count(|o| matches!(o, RecipientOutcome::Delivered { .. }))
    }

    pub fn suppressed(&self) -> usize {
        self.count(|o| matches!(o, RecipientOutcome::Suppressed))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RecipientOutcome::Failed { .. }))
    }

    pub fn outcome_for(&self, email: &str) -> Option<&RecipientOutcome> {
        self.outcomes
            .iter()
            .find(|(user, _)| user.email == email)
            .map(|(_, outcome)| outcome)
    }

    fn count(&self, f: impl Fn(&RecipientOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| f(o)).count()
    }
}

/// 通知分发器
///
/// 对每个接收人：先在冷却账本中占位，再投递；失败按指数退避重试，
/// 用尽次数后记录 NotificationFailed 并归还名额，不会重新入队。
pub struct NotificationDispatcher {
    transport: Arc<dyn MailTransport>,
    ledger: CooldownLedger,
    policy: Arc<PolicyHandle>,
    retry: RetryPolicy,
}

impl NotificationDispatcher {
    pub fn new(
        transport: Arc<dyn MailTransport>,
        policy: Arc<PolicyHandle>,
        cooldown: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            ledger: CooldownLedger::new(cooldown),
            policy,
            retry,
        }
    }

    pub fn from_config(
        transport: Arc<dyn MailTransport>,
        policy: Arc<PolicyHandle>,
        config: &NotifyConfig,
    ) -> Self {
        Self::new(
            transport,
            policy,
            config.cooldown(),
            RetryPolicy::from_config(config),
        )
    }

    pub fn ledger(&self) -> &CooldownLedger {
        &self.ledger
    }

    pub async fn dispatch(&self, event: &AlertEvent, recipients: &BTreeSet<UserRef>) -> DispatchResult {
        let mut result = DispatchResult::default();
        if recipients.is_empty() {
            warn!(
                server_id = %event.server_id,
                server_name = %event.server_name,
                metric = %event.metric_kind,
                "No recipients associated with server, alert not sent"
            );
            return result;
        }

        let snapshot = self.policy.load();
        let thresholds = snapshot.policy.thresholds_for(event.metric_kind).ok();
        let message = render(event, thresholds.as_ref());

        for recipient in recipients {
            let record = NotificationRecord::new(event, recipient);
            if !self.ledger.try_reserve(&record, Utc::now()) {
                result.outcomes.push((recipient.clone(), RecipientOutcome::Suppressed));
                continue;
            }

            let outcome = self.deliver(recipient, &message.subject, &message.body).await;
            match &outcome {
                RecipientOutcome::Delivered { attempts } => {
                    info!(
                        server_name = %event.server_name,
                        metric = %event.metric_kind,
                        level = %event.to_level,
                        recipient = %recipient.email,
                        attempts,
                        transport = self.transport.name(),
                        "Notification sent"
                    );
                }
                RecipientOutcome::Failed { attempts, error } => {
                    self.ledger.release(&record);
                    error!(
                        server_name = %event.server_name,
                        metric = %event.metric_kind,
                        level = %event.to_level,
                        recipient = %recipient.email,
                        attempts,
                        error = %error,
                        "NotificationFailed"
                    );
                }
                RecipientOutcome::Suppressed => {}
            }
            result.outcomes.push((recipient.clone(), outcome));
        }

        result
    }

    async fn deliver(&self, to: &UserRef, subject: &str, body: &str) -> RecipientOutcome {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.transport.send(to, subject, body).await {
                Ok(()) => return RecipientOutcome::Delivered { attempts: attempt },
                Err(error) if attempt >= self.retry.max_attempts() => {
                    return RecipientOutcome::Failed {
                        attempts: attempt,
                        error,
                    };
                }
                Err(error) => {
                    let delay = self.retry.delay(attempt);
                    debug!(
                        recipient = %to.email,
                        attempt,
                        delay = ?delay,
                        error = %error,
                        "Mail delivery failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
