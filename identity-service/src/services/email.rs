//! Notification sender.
//!
//! The core's responsibility ends at producing tokens and handing a message
//! to the sender; actual delivery is fully external. The log-only sender is
//! the default when SMTP is not configured.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::SmtpConfig;

use super::error::ServiceError;

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
        text_body: Option<&str>,
    ) -> Result<(), ServiceError>;
}

pub fn confirmation_email(link: &str) -> (String, String, String) {
    let subject = "Confirm your email address".to_string();
    let html = format!(
        "<html><body><h2>Welcome</h2>\
         <p>Please confirm your email address by following this link:</p>\
         <p><a href=\"{link}\">Confirm email</a></p>\
         <p>This link expires in 24 hours. If you did not register, ignore this email.</p>\
         </body></html>"
    );
    let text = format!(
        "Welcome\n\nPlease confirm your email address by visiting:\n{link}\n\n\
         This link expires in 24 hours. If you did not register, ignore this email."
    );
    (subject, html, text)
}

pub fn password_reset_email(link: &str) -> (String, String, String) {
    let subject = "Reset your password".to_string();
    let html = format!(
        "<html><body><h2>Password reset</h2>\
         <p>We received a request to reset your password. Follow this link to set a new one:</p>\
         <p><a href=\"{link}\">Reset password</a></p>\
         <p>This link expires in 1 hour. If you did not request this, ignore this email.</p>\
         </body></html>"
    );
    let text = format!(
        "Password reset\n\nWe received a request to reset your password. Visit:\n{link}\n\n\
         This link expires in 1 hour. If you did not request this, ignore this email."
    );
    (subject, html, text)
}

/// SMTP-backed sender.
pub struct SmtpSender {
    mailer: SmtpTransport,
    from: String,
}

impl SmtpSender {
    pub fn new(config: &SmtpConfig) -> Result<Self, ServiceError> {
        let creds = Credentials::new(config.user.clone(), config.password.clone());
        let mailer = SmtpTransport::relay(&config.host)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!(e.to_string())))?
            .credentials(creds)
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, "SMTP sender initialized");
        Ok(Self {
            mailer,
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl NotificationSender for SmtpSender {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
        text_body: Option<&str>,
    ) -> Result<(), ServiceError> {
        let builder = Message::builder()
            .from(self.from.parse().map_err(|e: lettre::address::AddressError| {
                ServiceError::Internal(e.into())
            })?)
            .to(to.parse().map_err(|e: lettre::address::AddressError| {
                ServiceError::Internal(e.into())
            })?)
            .subject(subject);

        let email = match text_body {
            Some(text) => builder
                .multipart(
                    MultiPart::alternative()
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_PLAIN)
                                .body(text.to_string()),
                        )
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_HTML)
                                .body(html_body.to_string()),
                        ),
                )
                .map_err(|e| ServiceError::Internal(e.into()))?,
            None => builder
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(html_body.to_string()),
                )
                .map_err(|e| ServiceError::Internal(e.into()))?,
        };

        // Blocking transport; keep it off the async runtime.
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| ServiceError::Internal(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to, subject = %subject, "Email sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to, "Failed to send email");
                Err(ServiceError::Internal(anyhow::anyhow!(e.to_string())))
            }
        }
    }
}

/// Logs the message instead of delivering it. Default in development.
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        _html_body: &str,
        text_body: Option<&str>,
    ) -> Result<(), ServiceError> {
        tracing::info!(
            to = %to,
            subject = %subject,
            body = %text_body.unwrap_or(""),
            "Notification (log-only sender)"
        );
        Ok(())
    }
}

/// Records messages for assertions in tests.
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<RecordedMessage>>,
}

#[derive(Debug, Clone)]
pub struct RecordedMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: Option<String>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<RecordedMessage> {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
        text_body: Option<&str>,
    ) -> Result<(), ServiceError> {
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(RecordedMessage {
                to: to.to_string(),
                subject: subject.to_string(),
                html_body: html_body.to_string(),
                text_body: text_body.map(|t| t.to_string()),
            });
        Ok(())
    }
}
