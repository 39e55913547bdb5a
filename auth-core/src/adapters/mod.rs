//! External collaborators consumed by the orchestrator, behind trait seams.

mod email;
mod facebook;
mod google;
mod provider;
mod sms;
mod token;

pub use email::{EmailSender, NotificationError, SmtpEmailSender};
pub use facebook::FacebookProvider;
pub use google::GoogleProvider;
pub use provider::{ExchangedCode, ProviderError, ProviderUser, SignInProvider};
pub use sms::{SmsSender, TwilioSmsSender};
pub use token::{AccessToken, JwtTokenMinter, TokenError, TokenMinter};
