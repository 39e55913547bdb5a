//! Failure taxonomy of the orchestrator.
//!
//! Callers get one coarse, stable category per failure site; the underlying
//! cause is logged where it happened and does not propagate verbatim.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("failed to open transaction")]
    Transaction,

    #[error("failed to read from store")]
    StoreRead,

    #[error("failed to write to store")]
    StoreWrite,

    #[error("unable to relate account")]
    AccountLinking,

    #[error("failed to exchange provider code")]
    ProviderExchange,

    #[error("missing required scopes")]
    InsufficientScopes,

    #[error("provider email not verified")]
    UnverifiedEmail,

    #[error("failed to deliver verification code")]
    NotificationDelivery,

    #[error("magic link code not found")]
    MagicLinkNotFound,

    #[error("refresh token not found")]
    RefreshTokenNotFound,

    #[error("failed to issue credentials")]
    CredentialIssuance,
}
