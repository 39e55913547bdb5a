//! PostgreSQL implementations of the store contracts.
//!
//! Uniqueness invariants (account email/phone, `(provider, provider_id)`,
//! one identity per provider kind per account) live in the schema as unique
//! indexes, so concurrent check-then-create sequences fail on the
//! constraint instead of silently duplicating rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::{Account, MagicLinkCode, Phone, Provider, RefreshToken, SignInIdentity};
use crate::stores::{
    AccountStore, CreateAccount, CreatedAccount, CreatedRefreshToken, MagicLinkCodeStore,
    NewSignInIdentity, ProviderIdentity, RefreshTokenStore, StoreError, TxManager,
};

pub type PgTx = sqlx::Transaction<'static, sqlx::Postgres>;

/// Transaction manager backed by a connection pool.
#[derive(Clone)]
pub struct PgTxManager {
    pool: PgPool,
}

impl PgTxManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TxManager for PgTxManager {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, StoreError> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: PgTx) -> Result<(), StoreError> {
        Ok(tx.commit().await?)
    }

    async fn rollback(&self, tx: PgTx) -> Result<(), StoreError> {
        Ok(tx.rollback().await?)
    }
}

/// Stateless store facade; all state travels through the transaction.
#[derive(Clone, Default)]
pub struct PgStores;

#[derive(FromRow)]
struct AccountRow {
    account_id: Uuid,
    email: Option<String>,
    phone_country_code: Option<String>,
    phone_number: Option<String>,
    created_utc: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        let phone = match (row.phone_country_code, row.phone_number) {
            (Some(country_code), Some(number)) => Some(Phone {
                country_code,
                number,
            }),
            _ => None,
        };
        Account {
            id: row.account_id,
            email: row.email,
            phone,
            created_at: row.created_utc,
        }
    }
}

#[derive(FromRow)]
struct ProviderIdentityRow {
    account_id: Uuid,
    provider_code: String,
    provider_subject: String,
    email: Option<String>,
}

impl TryFrom<ProviderIdentityRow> for ProviderIdentity {
    type Error = StoreError;

    fn try_from(row: ProviderIdentityRow) -> Result<Self, StoreError> {
        let provider = Provider::from_str(&row.provider_code).map_err(StoreError::Decode)?;
        Ok(ProviderIdentity {
            account_id: row.account_id,
            provider,
            provider_id: row.provider_subject,
            email: row.email,
        })
    }
}

#[derive(FromRow)]
struct MagicLinkCodeRow {
    account_id: Uuid,
    code: String,
    is_first_access: bool,
    created_utc: DateTime<Utc>,
    expiry_utc: DateTime<Utc>,
}

impl From<MagicLinkCodeRow> for MagicLinkCode {
    fn from(row: MagicLinkCodeRow) -> Self {
        MagicLinkCode {
            account_id: row.account_id,
            code: row.code,
            is_first_access: row.is_first_access,
            created_at: row.created_utc,
            expires_at: row.expiry_utc,
        }
    }
}

async fn insert_identity(
    tx: &mut PgTx,
    account_id: Uuid,
    identity: &NewSignInIdentity,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO sign_in_identities
            (identity_id, account_id, provider_code, provider_subject,
             access_token, refresh_token, expiry_utc, created_utc)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(account_id)
    .bind(identity.provider.as_str())
    .bind(&identity.provider_id)
    .bind(&identity.access_token)
    .bind(&identity.refresh_token)
    .bind(identity.expires_at)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl AccountStore<PgTx> for PgStores {
    async fn create(
        &self,
        tx: &mut PgTx,
        input: CreateAccount,
    ) -> Result<CreatedAccount, StoreError> {
        let account_id = Uuid::new_v4();
        let (country_code, number) = match &input.phone {
            Some(phone) => (Some(phone.country_code.clone()), Some(phone.number.clone())),
            None => (None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO accounts
                (account_id, email, phone_country_code, phone_number, created_utc)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(account_id)
        .bind(&input.email)
        .bind(country_code)
        .bind(number)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        for identity in &input.identities {
            insert_identity(tx, account_id, identity).await?;
        }

        Ok(CreatedAccount { id: account_id })
    }

    async fn get_by_email(&self, tx: &mut PgTx, email: &str) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT account_id, email, phone_country_code, phone_number, created_utc \
             FROM accounts WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.map(Account::from))
    }

    async fn get_by_phone(&self, tx: &mut PgTx, phone: &Phone) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT account_id, email, phone_country_code, phone_number, created_utc \
             FROM accounts WHERE phone_country_code = $1 AND phone_number = $2",
        )
        .bind(&phone.country_code)
        .bind(&phone.number)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.map(Account::from))
    }

    async fn get_many_by_provider(
        &self,
        tx: &mut PgTx,
        provider_id: &str,
        provider: Provider,
        email: &str,
    ) -> Result<Vec<ProviderIdentity>, StoreError> {
        let rows = sqlx::query_as::<_, ProviderIdentityRow>(
            r#"
            SELECT si.account_id, si.provider_code, si.provider_subject, a.email
            FROM sign_in_identities si
            JOIN accounts a ON a.account_id = si.account_id
            WHERE (si.provider_subject = $1 AND si.provider_code = $2)
               OR a.email = $3
            "#,
        )
        .bind(provider_id)
        .bind(provider.as_str())
        .bind(email)
        .fetch_all(&mut **tx)
        .await?;

        rows.into_iter().map(ProviderIdentity::try_from).collect()
    }

    async fn attach_identity(
        &self,
        tx: &mut PgTx,
        account_id: Uuid,
        identity: NewSignInIdentity,
    ) -> Result<SignInIdentity, StoreError> {
        insert_identity(tx, account_id, &identity).await?;
        Ok(SignInIdentity {
            account_id,
            provider: identity.provider,
            provider_id: identity.provider_id,
            access_token: identity.access_token,
            refresh_token: identity.refresh_token,
            expires_at: identity.expires_at,
        })
    }
}

#[async_trait]
impl RefreshTokenStore<PgTx> for PgStores {
    async fn create(
        &self,
        tx: &mut PgTx,
        account_id: Uuid,
    ) -> Result<CreatedRefreshToken, StoreError> {
        let value = RefreshToken::generate_value();
        let record = RefreshToken::new(account_id, &value);

        sqlx::query(
            "INSERT INTO refresh_tokens (account_id, token_hash, created_utc) \
             VALUES ($1, $2, $3)",
        )
        .bind(record.account_id)
        .bind(&record.token_hash)
        .bind(record.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(CreatedRefreshToken {
            refresh_token: value,
        })
    }

    async fn exists(&self, tx: &mut PgTx, account_id: Uuid, token: &str) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM refresh_tokens \
             WHERE account_id = $1 AND token_hash = $2)",
        )
        .bind(account_id)
        .bind(RefreshToken::hash_token(token))
        .fetch_one(&mut **tx)
        .await?;
        Ok(exists)
    }
}

#[async_trait]
impl MagicLinkCodeStore<PgTx> for PgStores {
    async fn upsert(
        &self,
        tx: &mut PgTx,
        account_id: Uuid,
        is_first_access: bool,
    ) -> Result<MagicLinkCode, StoreError> {
        let code = MagicLinkCode::generate(account_id, is_first_access);

        sqlx::query(
            r#"
            INSERT INTO magic_link_codes
                (account_id, code, is_first_access, created_utc, expiry_utc)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (account_id) DO UPDATE
                SET code = EXCLUDED.code,
                    is_first_access = EXCLUDED.is_first_access,
                    created_utc = EXCLUDED.created_utc,
                    expiry_utc = EXCLUDED.expiry_utc
            "#,
        )
        .bind(code.account_id)
        .bind(&code.code)
        .bind(code.is_first_access)
        .bind(code.created_at)
        .bind(code.expires_at)
        .execute(&mut **tx)
        .await?;

        Ok(code)
    }

    async fn consume(
        &self,
        tx: &mut PgTx,
        account_id: Uuid,
        code: &str,
    ) -> Result<Option<MagicLinkCode>, StoreError> {
        let row = sqlx::query_as::<_, MagicLinkCodeRow>(
            r#"
            DELETE FROM magic_link_codes
            WHERE account_id = $1 AND code = $2 AND expiry_utc > NOW()
            RETURNING account_id, code, is_first_access, created_utc, expiry_utc
            "#,
        )
        .bind(account_id)
        .bind(code)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.map(MagicLinkCode::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    // Requires a running PostgreSQL with the migrations applied.
    #[tokio::test]
    #[ignore]
    async fn test_passwordless_round_trip() {
        let config = crate::config::DatabaseConfig {
            url: "postgres://localhost/auth_core_test".to_string(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_secs: 5,
            idle_timeout_secs: 60,
        };
        let pool = db::create_pool(&config).await.expect("pool");
        db::run_migrations(&pool).await.expect("migrations");

        let manager = PgTxManager::new(pool);
        let stores = PgStores;

        let mut tx = manager.begin().await.expect("begin");
        let account = AccountStore::create(
            &stores,
            &mut tx,
            CreateAccount {
                email: Some(format!("{}@example.com", Uuid::new_v4())),
                ..Default::default()
            },
        )
        .await
        .expect("create account");

        let code = stores
            .upsert(&mut tx, account.id, true)
            .await
            .expect("upsert code");

        let consumed = stores
            .consume(&mut tx, account.id, &code.code)
            .await
            .expect("consume");
        assert!(consumed.is_some());

        let again = stores
            .consume(&mut tx, account.id, &code.code)
            .await
            .expect("consume again");
        assert!(again.is_none());

        manager.rollback(tx).await.expect("rollback");
    }
}
