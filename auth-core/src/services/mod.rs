//! Core services.

mod account;
mod error;


pub use account::{AccountService, Credentials};
pub use error::AuthError;
