//! OAuth2 token exchange against the Google token endpoint.
//!
//! Two grants, selected by credential tag:
//! - JWT-Bearer (service accounts): a signed assertion is the proof of
//!   identity
//! - refresh_token (authorized users)
//!
//! No retries here; every failure surfaces to the caller.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::assertion::sign_assertion;
use crate::credentials::{AuthorizedUserKey, ServiceAccountKey};
use crate::error::{AuthError, AuthResult};

/// RFC 7523 grant type for signed JWT assertions.
const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Token lifetime assumed when the endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// A freshly minted bearer token.
#[derive(Debug)]
pub struct MintedToken {
    pub access_token: String,
    /// Seconds until expiry, as reported by the endpoint.
    pub expires_in: i64,
}

#[derive(Deserialize)]
struct TokenEndpointResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

/// Thin form-POST client for the OAuth token endpoint.
pub struct TokenExchangeClient {
    http: reqwest::Client,
}

impl TokenExchangeClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// JWT-Bearer grant: trade a signed assertion for an access token.
    pub async fn exchange_service_account(
        &self,
        account: &ServiceAccountKey,
        scope_key: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<MintedToken> {
        let assertion = sign_assertion(account, scope_key, now)?;
        let form = [
            ("grant_type", JWT_BEARER_GRANT_TYPE),
            ("assertion", assertion.as_str()),
        ];
        self.post_form(account.token_uri(), &form).await
    }

    /// Refresh-token grant for an authorized user.
    pub async fn exchange_authorized_user(
        &self,
        account: &AuthorizedUserKey,
        scope_key: &str,
    ) -> AuthResult<MintedToken> {
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", account.client_id.as_str()),
            ("client_secret", account.client_secret.as_str()),
            ("refresh_token", account.refresh_token.as_str()),
            ("scope", scope_key),
        ];
        self.post_form(account.token_uri(), &form).await
    }

    async fn post_form(&self, token_uri: &str, form: &[(&str, &str)]) -> AuthResult<MintedToken> {
        let response = self.http.post(token_uri).form(form).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(AuthError::token_endpoint(status.as_u16(), &body));
        }

        let parsed: TokenEndpointResponse = serde_json::from_str(&body)?;
        let access_token = parsed.access_token.ok_or(AuthError::MissingAccessToken)?;

        Ok(MintedToken {
            access_token,
            expires_in: parsed.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
        })
    }
}
