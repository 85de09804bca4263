pub mod cooldown;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod queue;
pub mod transport;

pub use cooldown::{CooldownLedger, NotificationRecord};
pub use dispatcher::{DispatchResult, NotificationDispatcher, RecipientOutcome, RetryPolicy};
pub use error::{NotifyError, Result, TransportError};
pub use message::{render, RenderedMessage};
pub use queue::{DispatchJob, DispatchListener, DispatchQueue};
pub use transport::{LogTransport, MailTransport, SmtpMailTransport};
