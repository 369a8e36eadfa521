use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::config::NotificationConfig;

use super::domain::RefundRequest;

/// Plain-text e-mail handed to a [`MailTransport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Outbound mail hook (SMTP relay, provider API, or a development sink).
pub trait MailTransport: Send + Sync {
    fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Mail dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
}

/// Development backend that writes each message to the log instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailTransport;

impl MailTransport for LogMailTransport {
    fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        info!(
            from = %message.from,
            to = %message.to.join(", "),
            subject = %message.subject,
            body = %message.body,
            "outbound mail"
        );
        Ok(())
    }
}

/// Drops every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledMailTransport;

impl MailTransport for DisabledMailTransport {
    fn send(&self, _message: &MailMessage) -> Result<(), MailError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    Sent,
    Failed,
}

/// Best-effort operator notification: one attempt, failures are logged and swallowed.
pub struct Notifier<T: ?Sized> {
    transport: Arc<T>,
    config: NotificationConfig,
}

impl<T> Notifier<T>
where
    T: MailTransport + ?Sized,
{
    pub fn new(transport: Arc<T>, config: NotificationConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }

    pub fn notify(&self, record: &RefundRequest) -> NotificationOutcome {
        let message = self.compose(record);
        match self.transport.send(&message) {
            Ok(()) => {
                info!(
                    request_id = %record.request_id,
                    to = %self.config.admin_email,
                    "operator notified"
                );
                NotificationOutcome::Sent
            }
            Err(err) => {
                error!(
                    request_id = %record.request_id,
                    error = %err,
                    "failed to send refund notification"
                );
                NotificationOutcome::Failed
            }
        }
    }

    /// Card and account numbers appear masked; the CVV is never included.
    pub fn compose(&self, record: &RefundRequest) -> MailMessage {
        let mut body = String::from("A new refund request has been submitted:\n\n");
        let optional = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
        let lines = [
            ("Request ID", record.request_id.to_string()),
            ("Recipient", record.recipient_name.clone()),
            ("Amount", format!("${}", record.refund_amount)),
            ("Bank", record.bank_name.clone()),
            ("Account Number", record.masked_account_number()),
            ("Card Number", record.masked_card_number()),
            ("Expiry Date", record.expiry_date.expose().to_string()),
            ("Status", record.status.label().to_string()),
            ("Submitted At", record.created_at.to_rfc3339()),
            ("Updated At", record.updated_at.to_rfc3339()),
            ("IP Address", optional(&record.ip_address)),
            ("User Agent", optional(&record.user_agent)),
        ];
        for (label, value) in lines {
            let _ = writeln!(body, "{label}: {value}");
        }

        MailMessage {
            from: self.config.from_email.clone(),
            to: vec![self.config.admin_email.clone()],
            subject: format!("New Refund Request - {}", record.request_id),
            body,
        }
    }
}
