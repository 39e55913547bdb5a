//! Google sign-in provider adapter.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::adapters::provider::{ExchangedCode, ProviderError, ProviderUser, SignInProvider};
use crate::config::GoogleOAuthConfig;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

const REQUIRED_SCOPES: &[&str] = &[
    "openid",
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
];

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
    /// Space-separated list of granted scopes.
    #[serde(default)]
    scope: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    email: String,
    verified_email: bool,
}

#[derive(Clone)]
pub struct GoogleProvider {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
}

impl GoogleProvider {
    pub fn new(config: &GoogleOAuthConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }
}

#[async_trait]
impl SignInProvider for GoogleProvider {
    async fn exchange_code(
        &self,
        code: &str,
        origin_url: &str,
    ) -> Result<ExchangedCode, ProviderError> {
        let response = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", origin_url),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status, body = %body, "Google token exchange error");
            return Err(ProviderError::Status { status, body });
        }

        let token: GoogleTokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        Ok(ExchangedCode {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
            scopes: token.scope.split_whitespace().map(str::to_string).collect(),
        })
    }

    fn has_required_scopes(&self, scopes: &[String]) -> bool {
        REQUIRED_SCOPES
            .iter()
            .all(|required| scopes.iter().any(|granted| granted == required))
    }

    async fn get_user_data(&self, access_token: &str) -> Result<ProviderUser, ProviderError> {
        let response = self
            .client
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status, body = %body, "Google userinfo error");
            return Err(ProviderError::Status { status, body });
        }

        let info: GoogleUserInfo = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        Ok(ProviderUser {
            id: info.id,
            email: info.email,
            is_email_verified: info.verified_email,
        })
    }
}
