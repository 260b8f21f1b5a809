//! Outgoing e-mail: recovery codes, password changes and statements

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};
use std::str::FromStr;

use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
};

/// A message with both plain-text and HTML bodies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl OutgoingEmail {
    /// Build a message whose HTML part is the text wrapped in `<pre>`
    pub fn plain(to: impl Into<String>, subject: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let html = format!(r#"<html><body><pre>{}</pre></body></html>"#, text);
        Self {
            to: to.into(),
            subject: subject.into(),
            text,
            html,
        }
    }
}

/// Notification collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> AppResult<()>;
}

/// Pick the mailer described by the configuration
pub fn from_config(config: &EmailConfig) -> std::sync::Arc<dyn Mailer> {
    if config.enabled {
        std::sync::Arc::new(SmtpMailer::new(config.clone()))
    } else {
        std::sync::Arc::new(LogMailer)
    }
}

/// Sends through an SMTP relay
#[derive(Clone)]
pub struct SmtpMailer {
    config: EmailConfig,
}

impl SmtpMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn transport(&self) -> AppResult<SmtpTransport> {
        let builder = if self.config.smtp_use_tls {
            SmtpTransport::starttls_relay(&self.config.smtp_host)
                .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
        }
        .port(self.config.smtp_port);

        let builder = match (&self.config.smtp_username, &self.config.smtp_password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        Ok(builder.build())
    }

    fn message(&self, email: OutgoingEmail) -> AppResult<Message> {
        let from_name = self.config.smtp_from_name.as_deref().unwrap_or("School Ledger");
        let from = Mailbox::from_str(&format!("{} <{}>", from_name, self.config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;
        let to = Mailbox::from_str(&email.to)
            .map_err(|e| AppError::BadRequest(format!("Invalid recipient address: {}", e)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> AppResult<()> {
        let to = email.to.clone();
        let message = self.message(email)?;
        let transport = self.transport()?;

        // lettre's SmtpTransport blocks
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| AppError::Internal(format!("Email task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Failed to send email: {}", e)))?;

        tracing::info!(to = %to, "Email sent");
        Ok(())
    }
}

/// Writes messages to the log instead of sending them
#[derive(Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> AppResult<()> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Email delivery disabled, message body follows:\n{}",
            email.text
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_wraps_text_in_html() {
        let email = OutgoingEmail::plain("ana@school.example", "Hi", "line");
        assert_eq!(email.text, "line");
        assert!(email.html.contains("<pre>line</pre>"));
    }

    #[test]
    fn smtp_rejects_bad_recipient() {
        let mailer = SmtpMailer::new(EmailConfig::default());
        let err = mailer
            .message(OutgoingEmail::plain("not an address", "Hi", "x"))
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
