//! Firestore error types.

use thiserror::Error;

/// Result type for Firestore operations.
pub type FirestoreResult<T> = Result<T, FirestoreError>;

/// Response-body characters carried in an error, at most.
const BODY_SNIPPET_MAX: usize = 200;

/// Errors that can occur during Firestore operations.
///
/// Missing configuration (no credential, no project) is NOT represented
/// here: those cases surface as `Ok(None)` / `Ok(vec![])` so callers can
/// tell "feature not configured" apart from "configured but failing".
#[derive(Debug, Error)]
pub enum FirestoreError {
    #[error("authentication failed: {0}")]
    Auth(#[from] rxlab_gauth::AuthError),

    #[error("request failed with {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FirestoreError {
    /// Non-2xx Firestore response, body clipped to a loggable snippet.
    pub fn request_failed(status: u16, body: &str) -> Self {
        Self::RequestFailed {
            status,
            body: snippet(body),
        }
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// HTTP status carried by this error, for metrics labels.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub(crate) fn snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_MAX).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_failed_clips_body() {
        let err = FirestoreError::request_failed(500, &"y".repeat(10_000));
        match &err {
            FirestoreError::RequestFailed { status, body } => {
                assert_eq!(*status, 500);
                assert_eq!(body.len(), BODY_SNIPPET_MAX);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.http_status(), Some(500));
    }

    #[test]
    fn test_non_http_errors_carry_no_status() {
        assert_eq!(
            FirestoreError::invalid_response("bad payload").http_status(),
            None
        );
    }
}
