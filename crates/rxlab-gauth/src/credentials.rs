//! Credential resolution and classification.
//!
//! A single JSON blob arrives via an environment variable and is classified
//! structurally, once, into a tagged [`Credential`]. Anything that fails to
//! parse or classify resolves to "no credential": persistence is an optional
//! capability in this deployment, and a misconfigured environment must
//! degrade the feature rather than crash the process.

use serde::Deserialize;

/// Environment variables scanned for the credential blob, first non-empty wins.
const CREDENTIAL_ENV_VARS: [&str; 3] = [
    "GOOGLE_SERVICE_ACCOUNT_JSON",
    "GOOGLE_APPLICATION_CREDENTIALS_JSON",
    "FIREBASE_SERVICE_ACCOUNT_JSON",
];

/// Explicit project override variables, checked before any credential field.
const PROJECT_ENV_VARS: [&str; 2] = ["GOOGLE_CLOUD_PROJECT", "GCP_PROJECT"];

/// Default Google OAuth2 token endpoint.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Service account key material (subset of the downloadable JSON key file).
///
/// `Debug`, `Display`, and `Serialize` are intentionally not implemented so
/// the private key cannot end up in logs or wire payloads.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    /// Token endpoint for this account, falling back to the Google default.
    pub fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }
}

/// Authorized-user credential (a human account's OAuth refresh token).
#[derive(Clone, Deserialize)]
pub struct AuthorizedUserKey {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub quota_project_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl AuthorizedUserKey {
    /// Token endpoint for this account, falling back to the Google default.
    pub fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }
}

/// A resolved Google credential, classified once at parse time.
#[derive(Clone)]
pub enum Credential {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserKey),
}

impl Credential {
    /// Stable identity component of the token cache key.
    pub fn identity_key(&self) -> &str {
        match self {
            Credential::ServiceAccount(account) => &account.client_email,
            Credential::AuthorizedUser(account) => &account.client_id,
        }
    }
}

/// Structural classification of a raw credential blob.
///
/// `client_email` plus `private_key` means service account.
/// `"type": "authorized_user"` plus the three required fields means
/// authorized user. Everything else, malformed JSON included, is `None`.
fn classify(raw: &str) -> Option<Credential> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    let has = |field: &str| {
        value
            .get(field)
            .and_then(serde_json::Value::as_str)
            .is_some_and(|s| !s.is_empty())
    };

    let is_service_account = has("client_email") && has("private_key");
    let is_authorized_user = value.get("type").and_then(serde_json::Value::as_str)
        == Some("authorized_user")
        && has("client_id")
        && has("client_secret")
        && has("refresh_token");

    if is_service_account {
        serde_json::from_value(value)
            .ok()
            .map(Credential::ServiceAccount)
    } else if is_authorized_user {
        serde_json::from_value(value)
            .ok()
            .map(Credential::AuthorizedUser)
    } else {
        None
    }
}

/// Holder for the process's single credential set.
pub struct CredentialStore {
    credential: Option<Credential>,
}

impl CredentialStore {
    /// Resolve the credential from the environment.
    pub fn from_env() -> Self {
        let credential = CREDENTIAL_ENV_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|raw| !raw.trim().is_empty())
            .and_then(|raw| classify(&raw));

        Self { credential }
    }

    /// Build a store around an explicit credential (or none).
    pub fn with_credential(credential: Option<Credential>) -> Self {
        Self { credential }
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    fn project_env_override() -> Option<String> {
        PROJECT_ENV_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|value| !value.trim().is_empty())
    }

    /// GCP project id: explicit env override, else the service account's own.
    pub fn project_id(&self) -> Option<String> {
        Self::project_env_override().or_else(|| match &self.credential {
            Some(Credential::ServiceAccount(account)) => account.project_id.clone(),
            _ => None,
        })
    }

    /// Quota project: same env precedence, else the authorized user's
    /// `quota_project_id`. Service accounts carry no quota override.
    pub fn quota_project_id(&self) -> Option<String> {
        Self::project_env_override().or_else(|| match &self.credential {
            Some(Credential::AuthorizedUser(account)) => account.quota_project_id.clone(),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use serial_test::serial;

    fn clear_env() {
        for name in CREDENTIAL_ENV_VARS.iter().chain(PROJECT_ENV_VARS.iter()) {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn test_classify_service_account() {
        let raw = test_support::service_account_json("sa@proj.iam.gserviceaccount.com", None);
        match classify(&raw) {
            Some(Credential::ServiceAccount(account)) => {
                assert_eq!(account.client_email, "sa@proj.iam.gserviceaccount.com");
                assert_eq!(account.project_id.as_deref(), Some("test-project"));
                assert_eq!(account.token_uri(), DEFAULT_TOKEN_URI);
            }
            _ => panic!("expected a service account"),
        }
    }

    #[test]
    fn test_classify_authorized_user() {
        let raw = serde_json::json!({
            "type": "authorized_user",
            "client_id": "321.apps.googleusercontent.com",
            "client_secret": "shhh",
            "refresh_token": "1//refresh",
            "quota_project_id": "billed-project"
        })
        .to_string();

        match classify(&raw) {
            Some(Credential::AuthorizedUser(account)) => {
                assert_eq!(account.client_id, "321.apps.googleusercontent.com");
                assert_eq!(account.quota_project_id.as_deref(), Some("billed-project"));
            }
            _ => panic!("expected an authorized user"),
        }
    }

    #[test]
    fn test_classify_rejects_incomplete_authorized_user() {
        let raw = serde_json::json!({
            "type": "authorized_user",
            "client_id": "321.apps.googleusercontent.com"
        })
        .to_string();
        assert!(classify(&raw).is_none());
    }

    #[test]
    fn test_classify_rejects_garbage() {
        assert!(classify("not json at all").is_none());
        assert!(classify("{}").is_none());
        assert!(classify(r#"{"type": "external_account"}"#).is_none());
    }

    #[test]
    fn test_identity_key_per_tag() {
        let sa = classify(&test_support::service_account_json("a@b.iam", None)).unwrap();
        assert_eq!(sa.identity_key(), "a@b.iam");

        let user = classify(
            &serde_json::json!({
                "type": "authorized_user",
                "client_id": "cid",
                "client_secret": "s",
                "refresh_token": "r"
            })
            .to_string(),
        )
        .unwrap();
        assert_eq!(user.identity_key(), "cid");
    }

    #[test]
    #[serial]
    fn test_from_env_first_non_empty_wins() {
        clear_env();
        std::env::set_var("GOOGLE_SERVICE_ACCOUNT_JSON", "  ");
        std::env::set_var(
            "GOOGLE_APPLICATION_CREDENTIALS_JSON",
            test_support::service_account_json("adc@proj.iam", None),
        );

        let store = CredentialStore::from_env();
        match store.credential() {
            Some(Credential::ServiceAccount(account)) => {
                assert_eq!(account.client_email, "adc@proj.iam");
            }
            _ => panic!("expected the second variable to win"),
        }
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_malformed_is_soft_absent() {
        clear_env();
        std::env::set_var("FIREBASE_SERVICE_ACCOUNT_JSON", "{ truncated");
        let store = CredentialStore::from_env();
        assert!(store.credential().is_none());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_absent_is_soft_absent() {
        clear_env();
        let store = CredentialStore::from_env();
        assert!(store.credential().is_none());
        assert!(store.project_id().is_none());
        assert!(store.quota_project_id().is_none());
    }

    #[test]
    #[serial]
    fn test_project_id_env_override_beats_credential() {
        clear_env();
        std::env::set_var("GOOGLE_CLOUD_PROJECT", "override-project");
        let store = CredentialStore::with_credential(Some(
            classify(&test_support::service_account_json("sa@proj.iam", None)).unwrap(),
        ));
        assert_eq!(store.project_id().as_deref(), Some("override-project"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_project_id_falls_back_to_service_account() {
        clear_env();
        let store = CredentialStore::with_credential(Some(
            classify(&test_support::service_account_json("sa@proj.iam", None)).unwrap(),
        ));
        assert_eq!(store.project_id().as_deref(), Some("test-project"));
    }

    #[test]
    #[serial]
    fn test_quota_project_from_authorized_user_only() {
        clear_env();
        let user = classify(
            &serde_json::json!({
                "type": "authorized_user",
                "client_id": "cid",
                "client_secret": "s",
                "refresh_token": "r",
                "quota_project_id": "billed"
            })
            .to_string(),
        )
        .unwrap();
        let store = CredentialStore::with_credential(Some(user));
        assert_eq!(store.quota_project_id().as_deref(), Some("billed"));
        // Authorized users do not contribute a project id.
        assert!(store.project_id().is_none());

        let sa_store = CredentialStore::with_credential(Some(
            classify(&test_support::service_account_json("sa@proj.iam", None)).unwrap(),
        ));
        assert!(sa_store.quota_project_id().is_none());
    }
}
