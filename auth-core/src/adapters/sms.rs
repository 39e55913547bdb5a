//! Verification-code delivery over SMS (Twilio Messages API).

use async_trait::async_trait;

use crate::adapters::email::NotificationError;
use crate::config::SmsConfig;

#[async_trait]
pub trait SmsSender: Send + Sync {
    /// `to` is an E.164-style destination (country code + number).
    async fn send_verification_code(&self, to: &str, code: &str) -> Result<(), NotificationError>;
}

#[derive(Clone)]
pub struct TwilioSmsSender {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from: String,
}

impl TwilioSmsSender {
    pub fn new(config: &SmsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from: config.from_number.clone(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        )
    }
}

#[async_trait]
impl SmsSender for TwilioSmsSender {
    async fn send_verification_code(&self, to: &str, code: &str) -> Result<(), NotificationError> {
        let body = format!("Your sign-in code is {}. It expires in 15 minutes.", code);

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from.as_str()), ("Body", &body)])
            .send()
            .await
            .map_err(|e| NotificationError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %error_body, to = %to, "Twilio rejected SMS");
            return Err(NotificationError::Delivery(format!(
                "Twilio returned status {}",
                status
            )));
        }

        tracing::info!(to = %to, "Verification code SMS sent");
        Ok(())
    }
}
