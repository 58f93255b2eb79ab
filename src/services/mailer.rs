//! Outbound mail.
//!
//! DESIGN
//! ======
//! Route handlers depend on the `Mailer` trait so tests can record messages
//! instead of sending them. Production uses Resend; when mail is not
//! configured the `LogMailer` writes the message to the log so reset links
//! remain usable in development.

use resend_rs::Resend;
use resend_rs::types::CreateEmailBaseOptions;

use crate::config::MailConfig;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("email delivery failed: {0}")]
    Delivery(String),
}

/// One outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// Sends through the Resend HTTP API.
pub struct ResendMailer {
    client: Resend,
    from: String,
}

impl ResendMailer {
    #[must_use]
    pub fn new(config: &MailConfig) -> Self {
        Self { client: Resend::new(&config.resend_api_key), from: config.from.clone() }
    }
}

#[async_trait::async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let to = [mail.to.as_str()];
        let email = CreateEmailBaseOptions::new(&self.from, to, &mail.subject)
            .with_html(&mail.html)
            .with_text(&mail.text);
        self.client
            .emails
            .send(email)
            .await
            .map_err(|e| MailError::Delivery(e.to_string()))?;
        tracing::info!(to = %mail.to, subject = %mail.subject, "mail sent");
        Ok(())
    }
}

/// Logs messages instead of sending them.
pub struct LogMailer;

#[async_trait::async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        tracing::warn!(to = %mail.to, subject = %mail.subject, body = %mail.text, "mail not configured; message logged only");
        Ok(())
    }
}

#[cfg(test)]
#[path = "mailer_test.rs"]
mod tests;
