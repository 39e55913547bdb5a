//! Verification-code delivery over SMTP.

use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};
use thiserror::Error;
use std::time::Duration;

use crate::config::SmtpConfig;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Invalid destination address: {0}")]
    Address(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_verification_code(&self, to: &str, code: &str) -> Result<(), NotificationError>;
}

#[derive(Clone)]
pub struct SmtpEmailSender {
    mailer: SmtpTransport,
    from: String,
}

impl SmtpEmailSender {
    pub fn new(config: &SmtpConfig) -> Result<Self, NotificationError> {
        let creds = Credentials::new(config.user.clone(), config.password.clone());

        let mailer = SmtpTransport::relay(&config.host)
            .map_err(|e| NotificationError::Delivery(e.to_string()))?
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
impl EmailSender for SmtpEmailSender {
    async fn send_verification_code(&self, to: &str, code: &str) -> Result<(), NotificationError> {
        let body = format!(
            "Your sign-in code is {}.\n\n\
             It expires in 15 minutes. If you didn't request this, ignore this email.",
            code
        );

        let email = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e: lettre::address::AddressError| {
                        NotificationError::Address(e.to_string())
                    })?,
            )
            .to(to.parse().map_err(|e: lettre::address::AddressError| {
                NotificationError::Address(e.to_string())
            })?)
            .subject("Your sign-in code")
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| NotificationError::Delivery(e.to_string()))?;

        // Send on the blocking pool; the SMTP transport is synchronous.
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| NotificationError::Delivery(e.to_string()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to, "Verification code email sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to, "Failed to send verification email");
                Err(NotificationError::Delivery(e.to_string()))
            }
        }
    }
}
