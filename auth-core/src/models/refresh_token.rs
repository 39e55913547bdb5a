//! Refresh token model - long-lived session credential.

use chrono::{DateTime, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Refresh token record. The opaque token value itself is only ever held
/// transiently; at rest the store keeps the SHA-256 hash.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub account_id: Uuid,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Create a record for a freshly generated token value.
    pub fn new(account_id: Uuid, token: &str) -> Self {
        Self {
            account_id,
            token_hash: Self::hash_token(token),
            created_at: Utc::now(),
        }
    }

    /// Generate a new opaque token value.
    pub fn generate_value() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Hash a token value using SHA-256.
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_hashed_at_rest() {
        let value = RefreshToken::generate_value();
        let record = RefreshToken::new(Uuid::new_v4(), &value);

        assert_ne!(record.token_hash, value);
        assert_eq!(record.token_hash, RefreshToken::hash_token(&value));
    }

    #[test]
    fn test_generated_values_are_unique() {
        assert_ne!(
            RefreshToken::generate_value(),
            RefreshToken::generate_value()
        );
    }
}
