//! Persistence contracts consumed by the orchestrator.
//!
//! Every store method takes the transaction handle of the unit of work that
//! owns it. The handle type is chosen by the [`TxManager`] implementation,
//! so production code runs on PostgreSQL while tests run on an in-memory
//! double with real commit/rollback semantics.

pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Account, MagicLinkCode, Phone, Provider, SignInIdentity};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt record: {0}")]
    Decode(String),

    #[error("Store error: {0}")]
    Other(String),
}

/// Opens and finishes atomic units of work.
///
/// A handle is owned by exactly one operation, passed `&mut` to every store
/// call inside it, and consumed by commit or rollback. Writes under an
/// uncommitted handle must be invisible to other units of work.
#[async_trait]
pub trait TxManager: Send + Sync {
    type Tx: Send + 'static;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError>;
    async fn rollback(&self, tx: Self::Tx) -> Result<(), StoreError>;
}

/// Identity to attach when creating or linking an account.
#[derive(Debug, Clone)]
pub struct NewSignInIdentity {
    pub provider: Provider,
    pub provider_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateAccount {
    pub email: Option<String>,
    pub phone: Option<Phone>,
    pub identities: Vec<NewSignInIdentity>,
}

#[derive(Debug, Clone)]
pub struct CreatedAccount {
    pub id: Uuid,
}

/// One row of the candidate set the linking algorithm scans: an existing
/// identity that shares either the email or the `(provider, provider_id)`
/// pair with the incoming event.
#[derive(Debug, Clone)]
pub struct ProviderIdentity {
    pub account_id: Uuid,
    pub provider: Provider,
    pub provider_id: String,
    pub email: Option<String>,
}

#[async_trait]
pub trait AccountStore<Tx: Send + 'static>: Send + Sync {
    /// Create an account together with its initial identities in one call.
    /// Uniqueness of email, phone and `(provider, provider_id)` is the
    /// store's responsibility (unique constraints), since the caller's
    /// check-then-create sequence is not race-free on its own.
    async fn create(&self, tx: &mut Tx, input: CreateAccount) -> Result<CreatedAccount, StoreError>;

    async fn get_by_email(&self, tx: &mut Tx, email: &str) -> Result<Option<Account>, StoreError>;

    async fn get_by_phone(&self, tx: &mut Tx, phone: &Phone) -> Result<Option<Account>, StoreError>;

    /// All identities matching this provider subject or this email.
    /// No ordering is guaranteed.
    async fn get_many_by_provider(
        &self,
        tx: &mut Tx,
        provider_id: &str,
        provider: Provider,
        email: &str,
    ) -> Result<Vec<ProviderIdentity>, StoreError>;

    /// Bind a new identity to an existing account (email-link case).
    async fn attach_identity(
        &self,
        tx: &mut Tx,
        account_id: Uuid,
        identity: NewSignInIdentity,
    ) -> Result<SignInIdentity, StoreError>;
}

#[derive(Debug, Clone)]
pub struct CreatedRefreshToken {
    /// The opaque token value, returned exactly once. Only its hash is
    /// persisted.
    pub refresh_token: String,
}

#[async_trait]
pub trait RefreshTokenStore<Tx: Send + 'static>: Send + Sync {
    /// Generate, persist and return a new refresh token for the account.
    async fn create(&self, tx: &mut Tx, account_id: Uuid) -> Result<CreatedRefreshToken, StoreError>;

    async fn exists(&self, tx: &mut Tx, account_id: Uuid, token: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait MagicLinkCodeStore<Tx: Send + 'static>: Send + Sync {
    /// Create or overwrite the account's live code. Code generation is the
    /// store's responsibility.
    async fn upsert(
        &self,
        tx: &mut Tx,
        account_id: Uuid,
        is_first_access: bool,
    ) -> Result<MagicLinkCode, StoreError>;

    /// Fetch and invalidate the account's code in one step. Returns `None`
    /// for a wrong, expired or already-consumed code; a code never
    /// validates twice.
    async fn consume(
        &self,
        tx: &mut Tx,
        account_id: Uuid,
        code: &str,
    ) -> Result<Option<MagicLinkCode>, StoreError>;
}
