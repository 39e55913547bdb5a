//! External sign-in provider contract (Google, Facebook).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed provider response: {0}")]
    Malformed(String),
}

/// Provider tokens obtained from the authorization-code exchange.
#[derive(Debug, Clone)]
pub struct ExchangedCode {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    /// Scopes the user actually granted, in provider-native form.
    pub scopes: Vec<String>,
}

/// Verified profile data fetched with the provider access token.
#[derive(Debug, Clone)]
pub struct ProviderUser {
    /// Provider-assigned subject id.
    pub id: String,
    pub email: String,
    pub is_email_verified: bool,
}

#[async_trait]
pub trait SignInProvider: Send + Sync {
    /// Exchange an authorization code for provider tokens. `origin_url` is
    /// the redirect URI the code was issued against.
    async fn exchange_code(
        &self,
        code: &str,
        origin_url: &str,
    ) -> Result<ExchangedCode, ProviderError>;

    /// Whether the granted scopes cover the minimum this flow needs.
    fn has_required_scopes(&self, scopes: &[String]) -> bool;

    async fn get_user_data(&self, access_token: &str) -> Result<ProviderUser, ProviderError>;
}
