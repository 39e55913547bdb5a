//! Account model - the canonical identity a user authenticates as.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sign-in provider kinds.
///
/// Closed enumeration: a typo in a provider name must be a compile error,
/// never a silently unreachable identity row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Provider {
    Email,
    Phone,
    Google,
    Facebook,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Email => "EMAIL",
            Provider::Phone => "PHONE",
            Provider::Google => "GOOGLE",
            Provider::Facebook => "FACEBOOK",
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "EMAIL" => Ok(Provider::Email),
            "PHONE" => Ok(Provider::Phone),
            "GOOGLE" => Ok(Provider::Google),
            "FACEBOOK" => Ok(Provider::Facebook),
            _ => Err(format!("Invalid provider: {}", s)),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verified phone number, split the way providers deliver it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
    pub country_code: String,
    pub number: String,
}

impl Phone {
    /// E.164-style destination string for SMS dispatch.
    pub fn to_e164(&self) -> String {
        format!("{}{}", self.country_code, self.number)
    }
}

/// Account entity.
///
/// Email and phone are each unique across all accounts when present; the
/// store enforces this with unique indexes.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub email: Option<String>,
    pub phone: Option<Phone>,
    pub created_at: DateTime<Utc>,
}

/// One verified credential claim bound to an account.
///
/// `(provider, provider_id)` is unique across all identities, and an
/// account holds at most one identity per provider kind.
#[derive(Debug, Clone)]
pub struct SignInIdentity {
    pub account_id: Uuid,
    pub provider: Provider,
    /// Provider-assigned subject id.
    pub provider_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}
