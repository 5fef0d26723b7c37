//! Google Cloud authentication broker.
//!
//! Hand-rolled OAuth2 token minting for the RxLab backend, no cloud SDK:
//! - Credential resolution from an environment JSON blob (service account
//!   or authorized user)
//! - RS256 JWT-Bearer assertions for service accounts
//! - Refresh-token exchange for authorized users
//! - Expiry-aware, process-wide token caching

pub mod assertion;
pub mod credentials;
pub mod error;
pub mod exchange;
pub mod token_cache;

#[cfg(test)]
pub(crate) mod test_support;

pub use credentials::{
    AuthorizedUserKey, Credential, CredentialStore, ServiceAccountKey, DEFAULT_TOKEN_URI,
};
pub use error::{AuthError, AuthResult};
pub use exchange::{MintedToken, TokenExchangeClient};
pub use token_cache::{Clock, TokenCache};
