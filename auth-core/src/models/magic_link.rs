//! Magic link code model - single-use passwordless verification code.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use uuid::Uuid;

/// How long a passwordless code stays valid.
const CODE_TTL_MINUTES: i64 = 15;

/// Magic link code entity. One live code per account; each passwordless
/// request overwrites the previous one, and exchange consumes it exactly
/// once.
#[derive(Debug, Clone)]
pub struct MagicLinkCode {
    pub account_id: Uuid,
    pub code: String,
    /// True when the account was created by the request that issued this
    /// code, so the exchange caller can tell a signup from a login.
    pub is_first_access: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl MagicLinkCode {
    /// Create a fresh code for an account.
    pub fn generate(account_id: Uuid, is_first_access: bool) -> Self {
        let now = Utc::now();
        Self {
            account_id,
            code: Self::generate_code(),
            is_first_access,
            created_at: now,
            expires_at: now + Duration::minutes(CODE_TTL_MINUTES),
        }
    }

    /// Six-digit numeric code, zero-padded.
    fn generate_code() -> String {
        let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
        format!("{:06}", n)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}
