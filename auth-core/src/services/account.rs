//! Account orchestrator: resolves authentication events to accounts and
//! issues session credentials.
//!
//! Every public operation runs as one unit of work. The transaction handle
//! is owned by the operation that opened it, passed to every store call
//! inside it, and always committed or rolled back before the operation
//! returns. No partial success is ever observable: an account is never
//! visible without its identity, and a refresh token is never persisted
//! without its paired access token.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::{AccessToken, EmailSender, SignInProvider, SmsSender, TokenMinter};
use crate::models::{Phone, Provider};
use crate::services::AuthError;
use crate::stores::{
    AccountStore, CreateAccount, MagicLinkCodeStore, NewSignInIdentity, ProviderIdentity,
    RefreshTokenStore, TxManager,
};

/// Session credentials issued after successful resolution.
///
/// `refresh_token` is present whenever refresh-token creation was requested
/// for the flow, which is every credential-returning operation today.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    /// True when the account was created by this operation.
    pub is_first_access: bool,
}

/// Outcome of the account-linking scan over the candidate identity set.
#[derive(Debug, PartialEq, Eq)]
enum LinkResolution {
    /// The event belongs to this account; an identity for it already exists.
    Existing(Uuid),
    /// The event belongs to this account by email; a new identity for the
    /// incoming provider must be attached.
    LinkByEmail(Uuid),
}

/// Decide which account a provider event belongs to, given the non-empty
/// candidate set of identities sharing its email or its
/// `(provider, provider_id)` pair.
///
/// Precedence: a `(provider, provider_id)` match wins outright, even when
/// the stored email no longer matches (the user may have changed it on the
/// provider side). Otherwise a same-email identity under a *different*
/// provider kind links the event to that account, provided no identity of
/// the incoming kind exists for that email yet. Anything else is a
/// conservative failure, never an arbitrary pick.
fn resolve_linked_account(
    provider: Provider,
    provider_id: &str,
    email: &str,
    candidates: &[ProviderIdentity],
) -> Result<LinkResolution, AuthError> {
    let mut same_email: Option<ProviderIdentity> = None;
    let mut same_provider: Option<ProviderIdentity> = None;
    let mut email_already_has_kind = false;

    for candidate in candidates {
        let email_matches = candidate.email.as_deref() == Some(email);
        if email_matches && same_email.is_none() {
            // Clone at the point of match; no reference into the candidate
            // set survives the loop.
            same_email = Some(candidate.clone());
        }
        if email_matches && candidate.provider == provider {
            email_already_has_kind = true;
        }
        if candidate.provider == provider
            && candidate.provider_id == provider_id
            && same_provider.is_none()
        {
            same_provider = Some(candidate.clone());
        }
        if same_email.is_some() && same_provider.is_some() {
            break;
        }
    }

    if let Some(matched) = same_provider {
        return Ok(LinkResolution::Existing(matched.account_id));
    }

    if let Some(matched) = same_email {
        if matched.provider != provider && !email_already_has_kind {
            return Ok(LinkResolution::LinkByEmail(matched.account_id));
        }
    }

    Err(AuthError::AccountLinking)
}

/// The identity orchestrator.
///
/// Generic over the transaction manager so the same control flow runs on
/// PostgreSQL in production and on an in-memory double in tests.
pub struct AccountService<M: TxManager> {
    db: M,
    accounts: Arc<dyn AccountStore<M::Tx>>,
    refresh_tokens: Arc<dyn RefreshTokenStore<M::Tx>>,
    magic_links: Arc<dyn MagicLinkCodeStore<M::Tx>>,
    google: Arc<dyn SignInProvider>,
    facebook: Arc<dyn SignInProvider>,
    tokens: Arc<dyn TokenMinter>,
    email: Arc<dyn EmailSender>,
    sms: Arc<dyn SmsSender>,
}

impl<M: TxManager> AccountService<M> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: M,
        accounts: Arc<dyn AccountStore<M::Tx>>,
        refresh_tokens: Arc<dyn RefreshTokenStore<M::Tx>>,
        magic_links: Arc<dyn MagicLinkCodeStore<M::Tx>>,
        google: Arc<dyn SignInProvider>,
        facebook: Arc<dyn SignInProvider>,
        tokens: Arc<dyn TokenMinter>,
        email: Arc<dyn EmailSender>,
        sms: Arc<dyn SmsSender>,
    ) -> Self {
        Self {
            db,
            accounts,
            refresh_tokens,
            magic_links,
            google,
            facebook,
            tokens,
            email,
            sms,
        }
    }

    async fn begin(&self) -> Result<M::Tx, AuthError> {
        self.db.begin().await.map_err(|e| {
            tracing::error!(error = %e, "failed to open transaction");
            AuthError::Transaction
        })
    }

    /// Roll the unit of work back and return the given category.
    async fn abort<T>(&self, tx: M::Tx, error: AuthError) -> Result<T, AuthError> {
        if let Err(rollback_error) = self.db.rollback(tx).await {
            tracing::error!(error = %rollback_error, "rollback failed");
        }
        Err(error)
    }

    /// Produce an access token and, when requested, a refresh token, then
    /// finish the caller's transaction.
    ///
    /// The refresh-token write and the access-token mint are independent,
    /// so they run concurrently. Both results are awaited and combined
    /// before the transaction outcome is decided. Either failure rolls
    /// everything back: partial credential issuance must never be
    /// observable.
    async fn issue_credentials(
        &self,
        mut tx: M::Tx,
        account_id: Uuid,
        is_first_access: bool,
        create_refresh: bool,
    ) -> Result<Credentials, AuthError> {
        let refresh_fut = async {
            if create_refresh {
                self.refresh_tokens
                    .create(&mut tx, account_id)
                    .await
                    .map(Some)
            } else {
                Ok(None)
            }
        };

        let (refresh_result, access_result) =
            tokio::join!(refresh_fut, self.tokens.mint_access(account_id));

        match (refresh_result, access_result) {
            (Ok(refresh), Ok(access)) => {
                if let Err(e) = self.db.commit(tx).await {
                    tracing::error!(error = %e, account_id = %account_id, "credential commit failed");
                    return Err(AuthError::CredentialIssuance);
                }
                Ok(Credentials {
                    access_token: access.access_token,
                    refresh_token: refresh.map(|r| r.refresh_token),
                    expires_at: access.expires_at,
                    is_first_access,
                })
            }
            (refresh_result, access_result) => {
                if let Err(e) = refresh_result {
                    tracing::error!(error = %e, account_id = %account_id, "refresh token creation failed");
                }
                if let Err(e) = access_result {
                    tracing::error!(error = %e, account_id = %account_id, "access token minting failed");
                }
                self.abort(tx, AuthError::CredentialIssuance).await
            }
        }
    }

    /// Shared external-provider flow: exchange the code, validate scopes
    /// and email verification, resolve the account, issue credentials.
    /// Steps run in this exact order; any failure aborts the whole unit.
    async fn create_from_external(
        &self,
        provider_adapter: &dyn SignInProvider,
        provider: Provider,
        code: &str,
        origin_url: &str,
    ) -> Result<Credentials, AuthError> {
        let mut tx = self.begin().await?;

        let exchanged = match provider_adapter.exchange_code(code, origin_url).await {
            Ok(exchanged) => exchanged,
            Err(e) => {
                tracing::error!(error = %e, provider = %provider, "code exchange failed");
                return self.abort(tx, AuthError::ProviderExchange).await;
            }
        };

        if !provider_adapter.has_required_scopes(&exchanged.scopes) {
            tracing::warn!(provider = %provider, scopes = ?exchanged.scopes, "missing required scopes");
            return self.abort(tx, AuthError::InsufficientScopes).await;
        }

        let user = match provider_adapter.get_user_data(&exchanged.access_token).await {
            Ok(user) => user,
            Err(e) => {
                tracing::error!(error = %e, provider = %provider, "profile fetch failed");
                return self.abort(tx, AuthError::ProviderExchange).await;
            }
        };

        if !user.is_email_verified {
            tracing::warn!(provider = %provider, "provider email not verified");
            return self.abort(tx, AuthError::UnverifiedEmail).await;
        }

        let candidates = match self
            .accounts
            .get_many_by_provider(&mut tx, &user.id, provider, &user.email)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!(error = %e, "failed to load related identities");
                return self.abort(tx, AuthError::StoreRead).await;
            }
        };

        let identity = NewSignInIdentity {
            provider,
            provider_id: user.id.clone(),
            access_token: exchanged.access_token.clone(),
            refresh_token: exchanged.refresh_token.clone(),
            expires_at: exchanged.expires_at,
        };

        let (account_id, is_first_access) = if candidates.is_empty() {
            let created = match self
                .accounts
                .create(
                    &mut tx,
                    CreateAccount {
                        email: Some(user.email.clone()),
                        phone: None,
                        identities: vec![identity],
                    },
                )
                .await
            {
                Ok(created) => created,
                Err(e) => {
                    tracing::error!(error = %e, "account creation failed");
                    return self.abort(tx, AuthError::StoreWrite).await;
                }
            };
            (created.id, true)
        } else {
            match resolve_linked_account(provider, &user.id, &user.email, &candidates) {
                Ok(LinkResolution::Existing(account_id)) => (account_id, false),
                Ok(LinkResolution::LinkByEmail(account_id)) => {
                    if let Err(e) = self
                        .accounts
                        .attach_identity(&mut tx, account_id, identity)
                        .await
                    {
                        tracing::error!(error = %e, account_id = %account_id, "identity attach failed");
                        return self.abort(tx, AuthError::StoreWrite).await;
                    }
                    (account_id, false)
                }
                Err(error) => {
                    tracing::warn!(provider = %provider, "no linking rule matched");
                    return self.abort(tx, error).await;
                }
            }
        };

        tracing::info!(account_id = %account_id, provider = %provider, is_first_access, "provider sign-in resolved");

        self.issue_credentials(tx, account_id, is_first_access, true)
            .await
    }

    pub async fn create_from_google_provider(
        &self,
        code: &str,
        origin_url: &str,
    ) -> Result<Credentials, AuthError> {
        self.create_from_external(&*self.google, Provider::Google, code, origin_url)
            .await
    }

    pub async fn create_from_facebook_provider(
        &self,
        code: &str,
        origin_url: &str,
    ) -> Result<Credentials, AuthError> {
        self.create_from_external(&*self.facebook, Provider::Facebook, code, origin_url)
            .await
    }

    /// Start a passwordless email sign-in: find or create the account,
    /// upsert its magic-link code and dispatch it. A delivery failure rolls
    /// back everything, including the account creation: no orphaned
    /// account may be visible to later lookups.
    pub async fn create_from_email(&self, email: &str) -> Result<(), AuthError> {
        let mut tx = self.begin().await?;

        let existing = match self.accounts.get_by_email(&mut tx, email).await {
            Ok(existing) => existing,
            Err(e) => {
                tracing::error!(error = %e, "account lookup failed");
                return self.abort(tx, AuthError::StoreRead).await;
            }
        };

        let (account_id, is_first_access) = match existing {
            Some(account) => (account.id, false),
            None => {
                let created = match self
                    .accounts
                    .create(
                        &mut tx,
                        CreateAccount {
                            email: Some(email.to_string()),
                            phone: None,
                            identities: Vec::new(),
                        },
                    )
                    .await
                {
                    Ok(created) => created,
                    Err(e) => {
                        tracing::error!(error = %e, "account creation failed");
                        return self.abort(tx, AuthError::StoreWrite).await;
                    }
                };
                (created.id, true)
            }
        };

        let magic_link = match self
            .magic_links
            .upsert(&mut tx, account_id, is_first_access)
            .await
        {
            Ok(magic_link) => magic_link,
            Err(e) => {
                tracing::error!(error = %e, account_id = %account_id, "magic link upsert failed");
                return self.abort(tx, AuthError::StoreWrite).await;
            }
        };

        if let Err(e) = self
            .email
            .send_verification_code(email, &magic_link.code)
            .await
        {
            tracing::error!(error = %e, account_id = %account_id, "verification email failed");
            return self.abort(tx, AuthError::NotificationDelivery).await;
        }

        if let Err(e) = self.db.commit(tx).await {
            tracing::error!(error = %e, account_id = %account_id, "commit failed");
            return Err(AuthError::Transaction);
        }

        tracing::info!(account_id = %account_id, is_first_access, "magic link dispatched by email");
        Ok(())
    }

    /// Passwordless phone sign-in; same shape as the email flow with SMS
    /// dispatch.
    pub async fn create_from_phone(&self, phone: &Phone) -> Result<(), AuthError> {
        let mut tx = self.begin().await?;

        let existing = match self.accounts.get_by_phone(&mut tx, phone).await {
            Ok(existing) => existing,
            Err(e) => {
                tracing::error!(error = %e, "account lookup failed");
                return self.abort(tx, AuthError::StoreRead).await;
            }
        };

        let (account_id, is_first_access) = match existing {
            Some(account) => (account.id, false),
            None => {
                let created = match self
                    .accounts
                    .create(
                        &mut tx,
                        CreateAccount {
                            email: None,
                            phone: Some(phone.clone()),
                            identities: Vec::new(),
                        },
                    )
                    .await
                {
                    Ok(created) => created,
                    Err(e) => {
                        tracing::error!(error = %e, "account creation failed");
                        return self.abort(tx, AuthError::StoreWrite).await;
                    }
                };
                (created.id, true)
            }
        };

        let magic_link = match self
            .magic_links
            .upsert(&mut tx, account_id, is_first_access)
            .await
        {
            Ok(magic_link) => magic_link,
            Err(e) => {
                tracing::error!(error = %e, account_id = %account_id, "magic link upsert failed");
                return self.abort(tx, AuthError::StoreWrite).await;
            }
        };

        if let Err(e) = self
            .sms
            .send_verification_code(&phone.to_e164(), &magic_link.code)
            .await
        {
            tracing::error!(error = %e, account_id = %account_id, "verification SMS failed");
            return self.abort(tx, AuthError::NotificationDelivery).await;
        }

        if let Err(e) = self.db.commit(tx).await {
            tracing::error!(error = %e, account_id = %account_id, "commit failed");
            return Err(AuthError::Transaction);
        }

        tracing::info!(account_id = %account_id, is_first_access, "magic link dispatched by SMS");
        Ok(())
    }

    /// Exchange a magic-link code for credentials. Consuming the code and
    /// issuing the credentials share one transaction; a consumed or
    /// expired code never validates twice.
    pub async fn exchange_code(
        &self,
        account_id: Uuid,
        code: &str,
    ) -> Result<Credentials, AuthError> {
        let mut tx = self.begin().await?;

        let magic_link = match self.magic_links.consume(&mut tx, account_id, code).await {
            Ok(magic_link) => magic_link,
            Err(e) => {
                tracing::error!(error = %e, account_id = %account_id, "magic link lookup failed");
                return self.abort(tx, AuthError::StoreRead).await;
            }
        };

        let magic_link = match magic_link {
            Some(magic_link) => magic_link,
            None => return self.abort(tx, AuthError::MagicLinkNotFound).await,
        };

        self.issue_credentials(tx, account_id, magic_link.is_first_access, true)
            .await
    }

    /// Mint a fresh access token against an existing refresh token. No new
    /// refresh token is created.
    pub async fn refresh_token(
        &self,
        account_id: Uuid,
        refresh_token: &str,
    ) -> Result<AccessToken, AuthError> {
        let mut tx = self.begin().await?;

        let exists = match self
            .refresh_tokens
            .exists(&mut tx, account_id, refresh_token)
            .await
        {
            Ok(exists) => exists,
            Err(e) => {
                tracing::error!(error = %e, account_id = %account_id, "refresh token lookup failed");
                return self.abort(tx, AuthError::StoreRead).await;
            }
        };

        if !exists {
            return self.abort(tx, AuthError::RefreshTokenNotFound).await;
        }

        let access = match self.tokens.mint_access(account_id).await {
            Ok(access) => access,
            Err(e) => {
                tracing::error!(error = %e, account_id = %account_id, "access token minting failed");
                return self.abort(tx, AuthError::CredentialIssuance).await;
            }
        };

        if let Err(e) = self.db.commit(tx).await {
            tracing::error!(error = %e, account_id = %account_id, "commit failed");
            return Err(AuthError::Transaction);
        }

        Ok(access)
    }
}

// Keep the linking rules unit-testable without any store in play.
#[cfg(test)]
mod linking_tests {
    use super::*;

    fn candidate(
        account_id: Uuid,
        provider: Provider,
        provider_id: &str,
        email: Option<&str>,
    ) -> ProviderIdentity {
        ProviderIdentity {
            account_id,
            provider,
            provider_id: provider_id.to_string(),
            email: email.map(str::to_string),
        }
    }

    #[test]
    fn test_provider_match_wins_over_email_match() {
        let by_provider = Uuid::new_v4();
        let by_email = Uuid::new_v4();
        let candidates = vec![
            candidate(by_email, Provider::Facebook, "f1", Some("a@x.com")),
            candidate(by_provider, Provider::Google, "g1", Some("old@x.com")),
        ];

        let resolution =
            resolve_linked_account(Provider::Google, "g1", "a@x.com", &candidates).unwrap();
        assert_eq!(resolution, LinkResolution::Existing(by_provider));
    }

    #[test]
    fn test_email_match_links_under_new_provider() {
        let account_id = Uuid::new_v4();
        let candidates = vec![candidate(
            account_id,
            Provider::Facebook,
            "f1",
            Some("a@x.com"),
        )];

        let resolution =
            resolve_linked_account(Provider::Google, "g1", "a@x.com", &candidates).unwrap();
        assert_eq!(resolution, LinkResolution::LinkByEmail(account_id));
    }

    #[test]
    fn test_email_match_with_same_provider_kind_is_ambiguous() {
        let account_id = Uuid::new_v4();
        // Same email already registered under this provider kind, but with
        // a different subject id: never silently pick it.
        let candidates = vec![candidate(
            account_id,
            Provider::Google,
            "other-subject",
            Some("a@x.com"),
        )];

        let result = resolve_linked_account(Provider::Google, "g1", "a@x.com", &candidates);
        assert_eq!(result, Err(AuthError::AccountLinking));
    }

    #[test]
    fn test_email_drift_on_provider_match() {
        let account_id = Uuid::new_v4();
        let candidates = vec![candidate(
            account_id,
            Provider::Google,
            "g1",
            Some("a@x.com"),
        )];

        // Provider-side email changed; the subject match still resolves.
        let resolution =
            resolve_linked_account(Provider::Google, "g1", "b@x.com", &candidates).unwrap();
        assert_eq!(resolution, LinkResolution::Existing(account_id));
    }
}
