//! Access token minting.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtConfig;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Token encoding failed: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

/// Claims for access tokens (short-lived).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (account id).
    pub sub: String,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// JWT ID.
    pub jti: String,
}

/// A minted access token and its expiry.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait TokenMinter: Send + Sync {
    async fn mint_access(&self, account_id: Uuid) -> Result<AccessToken, TokenError>;
}

/// HS256-signed JWT minter.
#[derive(Clone)]
pub struct JwtTokenMinter {
    encoding_key: EncodingKey,
    access_token_expiry_minutes: i64,
}

impl JwtTokenMinter {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
        }
    }
}

#[async_trait]
impl TokenMinter for JwtTokenMinter {
    async fn mint_access(&self, account_id: Uuid) -> Result<AccessToken, TokenError> {
        let now = Utc::now();
        let expires_at = now + Duration::minutes(self.access_token_expiry_minutes);

        let claims = AccessTokenClaims {
            sub: account_id.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let access_token = encode(&Header::default(), &claims, &self.encoding_key)?;

        Ok(AccessToken {
            access_token,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    fn minter() -> JwtTokenMinter {
        JwtTokenMinter::new(&JwtConfig {
            secret: "test-secret".to_string(),
            access_token_expiry_minutes: 15,
        })
    }

    #[tokio::test]
    async fn test_mint_access_claims() {
        let account_id = Uuid::new_v4();
        let minted = minter().mint_access(account_id).await.expect("mint");

        let decoded = decode::<AccessTokenClaims>(
            &minted.access_token,
            &DecodingKey::from_secret("test-secret".as_bytes()),
            &Validation::default(),
        )
        .expect("decode");

        assert_eq!(decoded.claims.sub, account_id.to_string());
        assert_eq!(decoded.claims.exp, minted.expires_at.timestamp());
    }

    #[tokio::test]
    async fn test_minted_tokens_carry_unique_jti() {
        let minter = minter();
        let account_id = Uuid::new_v4();
        let a = minter.mint_access(account_id).await.expect("mint");
        let b = minter.mint_access(account_id).await.expect("mint");
        assert_ne!(a.access_token, b.access_token);
    }
}
