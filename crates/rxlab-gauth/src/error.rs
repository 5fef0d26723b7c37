//! Auth error types.

use thiserror::Error;

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Response-body characters carried in an error, at most.
const BODY_SNIPPET_MAX: usize = 180;

/// Errors that can occur while minting an access token.
///
/// "No credential configured" is deliberately NOT an error: callers get
/// `Ok(None)` from [`crate::TokenCache::get_token`] and degrade gracefully.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token endpoint returned {status}: {body}")]
    TokenEndpoint { status: u16, body: String },

    #[error("token endpoint response has no access_token")]
    MissingAccessToken,

    #[error("malformed token response: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    #[error("assertion signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl AuthError {
    /// Non-2xx token endpoint response, body clipped to a loggable snippet.
    pub fn token_endpoint(status: u16, body: &str) -> Self {
        Self::TokenEndpoint {
            status,
            body: body.chars().take(BODY_SNIPPET_MAX).collect(),
        }
    }
}
