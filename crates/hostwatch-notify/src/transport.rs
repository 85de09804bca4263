use crate::error::TransportError;
use async_trait::async_trait;
use hostwatch_config::SmtpConfig;
use hostwatch_types::UserRef;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

/// 邮件传输
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, to: &UserRef, subject: &str, body: &str) -> Result<(), TransportError>;

    fn name(&self) -> &str;
}

/// SMTPS 邮件传输
pub struct SmtpMailTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailTransport {
    pub fn from_config(config: &SmtpConfig) -> Result<Self, TransportError> {
        let sender: Mailbox = config
            .sender
            .parse()
            .map_err(|e| TransportError::Address(format!("{}: {}", config.sender, e)))?;

        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| TransportError::Smtp(e.to_string()))?
            .credentials(creds)
            .port(config.port)
            .build();

        info!(host = %config.host, port = config.port, "SMTP transport configured");
        Ok(Self { mailer, sender })
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, to: &UserRef, subject: &str, body: &str) -> Result<(), TransportError> {
        let address: Address = to
            .email
            .parse()
            .map_err(|e| TransportError::Address(format!("{}: {}", to.email, e)))?;

        let email = Message::builder()
            .from(self.sender.clone())
            .to(Mailbox::new(Some(to.username.clone()), address))
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| TransportError::Message(e.to_string()))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| TransportError::Smtp(e.to_string()))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "smtp"
    }
}

/// 只写日志的传输，SMTP 未启用时使用
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, to: &UserRef, subject: &str, body: &str) -> Result<(), TransportError> {
        info!(recipient = %to, subject = %subject, "Mail delivery skipped (smtp disabled)");
        debug!(body = %body, "Mail body");
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smtp_transport_rejects_bad_sender() {
        let config = SmtpConfig {
            enabled: true,
            host: "smtp.example.com".to_string(),
            sender: "not an address".to_string(),
            ..Default::default()
        };
        let result = SmtpMailTransport::from_config(&config);
        assert!(matches!(result, Err(TransportError::Address(_))));
    }

    #[tokio::test]
    async fn test_log_transport_always_succeeds() {
        let transport = LogTransport;
        let to = UserRef::new("ops", "ops@example.com");
        assert!(transport.send(&to, "subject", "body").await.is_ok());
        assert_eq!(transport.name(), "log");
    }
}
