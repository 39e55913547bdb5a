//! Domain entities: accounts, sign-in identities and session credentials.

mod account;
mod magic_link;
mod refresh_token;

pub use account::{Account, Phone, Provider, SignInIdentity};
pub use magic_link::MagicLinkCode;
pub use refresh_token::RefreshToken;
