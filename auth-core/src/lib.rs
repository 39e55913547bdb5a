//! Identity resolution and credential issuance core.
//!
//! Resolves an authentication event (a verified email, a verified phone
//! number, or a completed OAuth handshake) to a single internal account,
//! creating or linking accounts as the business rules allow, and issues
//! session credentials atomically. The HTTP surface is intentionally not
//! part of this crate; embed [`services::AccountService`] behind whatever
//! transport you run.
//!
//! ```no_run
//! use std::sync::Arc;
//! use auth_core::adapters::{
//!     FacebookProvider, GoogleProvider, JwtTokenMinter, SmtpEmailSender, TwilioSmsSender,
//! };
//! use auth_core::config::AuthConfig;
//! use auth_core::services::AccountService;
//! use auth_core::stores::postgres::{PgStores, PgTxManager};
//!
//! # async fn build() -> anyhow::Result<()> {
//! let config = AuthConfig::from_env()?;
//! let pool = auth_core::db::create_pool(&config.database).await?;
//! auth_core::db::run_migrations(&pool).await?;
//!
//! let service = AccountService::new(
//!     PgTxManager::new(pool),
//!     Arc::new(PgStores),
//!     Arc::new(PgStores),
//!     Arc::new(PgStores),
//!     Arc::new(GoogleProvider::new(&config.google)),
//!     Arc::new(FacebookProvider::new(&config.facebook)),
//!     Arc::new(JwtTokenMinter::new(&config.jwt)),
//!     Arc::new(SmtpEmailSender::new(&config.smtp)?),
//!     Arc::new(TwilioSmsSender::new(&config.sms)),
//! );
//! # let _ = service;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod stores;
pub mod telemetry;
