//! Facebook sign-in provider adapter.
//!
//! Facebook's token response carries no scope list; granted permissions are
//! collected from the `/me/permissions` edge during the exchange so the
//! scope check has real data to look at.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::adapters::provider::{ExchangedCode, ProviderError, ProviderUser, SignInProvider};
use crate::config::FacebookOAuthConfig;

const TOKEN_URL: &str = "https://graph.facebook.com/v19.0/oauth/access_token";
const PERMISSIONS_URL: &str = "https://graph.facebook.com/v19.0/me/permissions";
const PROFILE_URL: &str = "https://graph.facebook.com/v19.0/me";

const REQUIRED_SCOPES: &[&str] = &["email", "public_profile"];

#[derive(Debug, Deserialize)]
struct FacebookTokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct FacebookPermission {
    permission: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct FacebookPermissionList {
    data: Vec<FacebookPermission>,
}

#[derive(Debug, Deserialize)]
struct FacebookProfile {
    id: String,
    email: Option<String>,
}

#[derive(Clone)]
pub struct FacebookProvider {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
}

impl FacebookProvider {
    pub fn new(config: &FacebookOAuthConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    async fn granted_permissions(&self, access_token: &str) -> Result<Vec<String>, ProviderError> {
        let response = self
            .client
            .get(PERMISSIONS_URL)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status, body = %body, "Facebook permissions error");
            return Err(ProviderError::Status { status, body });
        }

        let list: FacebookPermissionList = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        Ok(list
            .data
            .into_iter()
            .filter(|p| p.status == "granted")
            .map(|p| p.permission)
            .collect())
    }
}

#[async_trait]
impl SignInProvider for FacebookProvider {
    async fn exchange_code(
        &self,
        code: &str,
        origin_url: &str,
    ) -> Result<ExchangedCode, ProviderError> {
        let response = self
            .client
            .get(TOKEN_URL)
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", origin_url),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status, body = %body, "Facebook token exchange error");
            return Err(ProviderError::Status { status, body });
        }

        let token: FacebookTokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let scopes = self.granted_permissions(&token.access_token).await?;

        Ok(ExchangedCode {
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
            access_token: token.access_token,
            // Facebook issues no refresh token; the long-lived access token
            // is all there is.
            refresh_token: None,
            scopes,
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
            .get(PROFILE_URL)
            .query(&[("fields", "id,email")])
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status, body = %body, "Facebook profile error");
            return Err(ProviderError::Status { status, body });
        }

        let profile: FacebookProfile = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        // Facebook only exposes an email after verifying it, so presence
        // implies provider-verified.
        match profile.email {
            Some(email) => Ok(ProviderUser {
                id: profile.id,
                email,
                is_email_verified: true,
            }),
            None => Ok(ProviderUser {
                id: profile.id,
                email: String::new(),
                is_email_verified: false,
            }),
        }
    }
}
