use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Sends account mail (verification links, reset codes). Without SMTP
/// settings the message is only logged, which is what development uses.
#[derive(Clone)]
pub struct Mailer {
    smtp: Option<SmtpConfig>,
    frontend_url: String,
}

impl Mailer {
    pub fn new(smtp: Option<SmtpConfig>, frontend_url: String) -> Self {
        Self { smtp, frontend_url }
    }

    pub async fn send_verification(&self, to: &str, token: &str) -> Result<(), MailError> {
        let link = format!("{}/verify-email?token={}", self.frontend_url, token);
        let body = format!("Confirm your email address by opening this link:\n\n{}\n", link);
        self.send(to, "Verify your email", body).await
    }

    pub async fn send_password_reset(&self, to: &str, token: &str) -> Result<(), MailError> {
        let link = format!("{}/reset-password?token={}", self.frontend_url, token);
        let body = format!(
            "Someone asked to reset the password on this account. If it was you, open:\n\n{}\n\nOtherwise ignore this email.\n",
            link
        );
        self.send(to, "Reset your password", body).await
    }

    async fn send(&self, to: &str, subject: &str, body: String) -> Result<(), MailError> {
        let Some(smtp) = &self.smtp else {
            tracing::info!(to, subject, "SMTP not configured, mail not sent:\n{}", body);
            return Ok(());
        };

        let message = Message::builder()
            .from(smtp.from.parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)?
            .port(smtp.port);
        if let (Some(username), Some(password)) = (&smtp.username, &smtp.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        let transport = builder.build();

        tracing::info!("Sending '{}' via SMTP server {}:{}", subject, smtp.host, smtp.port);
        transport.send(message).await?;
        Ok(())
    }
}
