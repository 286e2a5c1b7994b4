use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Phrases the backend uses when a second lock collides with an existing one
const LOCK_CONFLICT_PHRASES: &[&str] = &[
    "already have a locked",
    "already locked",
    "already has a lock",
    "locked game",
];

/// Failure of a single call to the pick'em backend, classified at the network boundary
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session is no longer valid")]
    Unauthorized,

    #[error("not allowed: {0}")]
    Forbidden(String),

    #[error("{0}")]
    LockConflict(String),

    #[error("backend returned {status}: {detail}")]
    Rejected { status: StatusCode, detail: String },

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("unexpected response shape: {0}")]
    Decode(String),
}

/// Coarse buckets that decide how a caller reacts to an [`ApiError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Authorization,
    Conflict,
    Generic,
}

impl ApiError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ApiError::Unauthorized => ErrorCategory::Authentication,
            ApiError::Forbidden(_) => ErrorCategory::Authorization,
            ApiError::LockConflict(_) => ErrorCategory::Conflict,
            ApiError::Rejected { .. } | ApiError::Transport(_) | ApiError::Decode(_) => {
                ErrorCategory::Generic
            }
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.category() == ErrorCategory::Authentication
    }

    /// Human-readable text for display, preferring the server's own wording
    pub fn detail(&self) -> String {
        match self {
            ApiError::Forbidden(detail) | ApiError::LockConflict(detail) => detail.clone(),
            ApiError::Rejected { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }

    /// Map a non-success status plus its body to an error
    pub(crate) fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = extract_detail(body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::FORBIDDEN => ApiError::Forbidden(detail),
            _ if is_lock_conflict(&detail) => ApiError::LockConflict(detail),
            _ => ApiError::Rejected { status, detail },
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err)
        }
    }
}

/// Error body `{"detail": ...}`; validation errors carry a list instead of a string
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

fn extract_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Whether a rejection message describes a lock already held for the scoring period
pub fn is_lock_conflict(detail: &str) -> bool {
    let lower = detail.to_lowercase();
    lower.contains("lock") && LOCK_CONFLICT_PHRASES.iter().any(|p| lower.contains(p))
}
