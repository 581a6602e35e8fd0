//! Error handling for web store publishing
//!
//! This module provides the error taxonomy for the token → upload → publish
//! pipeline, with recovery guidance, using the thiserror crate.
//!
//! A store that accepts the HTTP exchange but reports a business-level failure
//! (bad upload state, non-OK publish status) is *not* an error here. Those
//! are carried by [`UploadOutcome`](crate::core::traits::UploadOutcome) and
//! [`PublishOutcome`](crate::core::traits::PublishOutcome) so the caller can
//! decide what to do with them.

use crate::security::Redactor;
use std::path::PathBuf;
use thiserror::Error;

/// Exact wording the Chrome Web Store uses when an item is mid-review.
///
/// The API exposes no structured code for this condition, so detection is a
/// substring match on the response body. Keep every use behind
/// [`is_review_pending_message`].
pub const REVIEW_PENDING_MESSAGE: &str =
    "Publish condition not met: You may not edit or publish an item that is in review.";

/// Returns true when an upstream error body carries the review-pending wording.
pub fn is_review_pending_message(body: &str) -> bool {
    body.contains(REVIEW_PENDING_MESSAGE)
}

/// Main error type for web store operations
#[derive(Error, Debug)]
pub enum StoreError {
    // Authentication
    #[error("[{store}] access token refresh rejected{}: {body}", format_status(.status))]
    Auth {
        store: String,
        status: Option<u16>,
        body: String,
    },

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    // Transport
    #[error("[{store}] {operation} request failed{}: {body}", format_status(.status))]
    Transport {
        store: String,
        operation: String,
        status: Option<u16>,
        body: String,
    },

    #[error("[{store}] item is currently in review and cannot be published: {message}")]
    ReviewPending { store: String, message: String },

    #[error("[{store}] unexpected {operation} response: {message}")]
    InvalidResponse {
        store: String,
        operation: String,
        message: String,
    },

    // Polling
    #[error("[{store}] upload still in progress after {attempts} status checks")]
    PollExhausted { store: String, attempts: u32 },

    #[error("[{store}] upload still in progress after {elapsed_secs}s")]
    PollTimedOut { store: String, elapsed_secs: u64 },

    #[error("[{store}] waiting for upload processing was cancelled")]
    Cancelled { store: String },

    // Package
    #[error("failed to read package {}: {message}", .path.display())]
    PackageRead { path: PathBuf, message: String },

    #[error("file not found: {pattern}")]
    PackageNotFound { pattern: String },

    #[error("multiple files found for {pattern}: {}", .matches.join(", "))]
    MultiplePackages {
        pattern: String,
        matches: Vec<String>,
    },

    // Configuration
    #[error("configuration error: {0}")]
    Config(String),
}

fn format_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" with status {}", code),
        None => String::new(),
    }
}

impl StoreError {
    /// Build the error for a failed store call, recognising the review-pending
    /// rejection by its message text.
    ///
    /// Classification reads the raw body; only the redacted copy is kept.
    pub fn from_store_response(
        store: &str,
        operation: &str,
        status: Option<u16>,
        raw_body: &str,
        redactor: &Redactor,
    ) -> Self {
        let body = redactor.redact(raw_body);

        if is_review_pending_message(raw_body) {
            return Self::ReviewPending {
                store: store.to_string(),
                message: body,
            };
        }

        Self::Transport {
            store: store.to_string(),
            operation: operation.to_string(),
            status,
            body,
        }
    }

    /// Get the store name associated with this error, if any
    pub fn store(&self) -> Option<&str> {
        match self {
            Self::Auth { store, .. }
            | Self::Transport { store, .. }
            | Self::ReviewPending { store, .. }
            | Self::InvalidResponse { store, .. }
            | Self::PollExhausted { store, .. }
            | Self::PollTimedOut { store, .. }
            | Self::Cancelled { store } => Some(store),
            Self::InvalidCredentials(_)
            | Self::PackageRead { .. }
            | Self::PackageNotFound { .. }
            | Self::MultiplePackages { .. }
            | Self::Config(_) => None,
        }
    }

    /// HTTP status code reported by the remote side, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } | Self::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Check if this error must fail the run
    ///
    /// Only a review-pending rejection may be downgraded by the caller.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::ReviewPending { .. })
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::Auth { .. } => vec![
                "Check the client id, client secret and refresh token",
                "Refresh tokens are revoked after long inactivity; generate a new one",
            ],
            Self::InvalidCredentials(_) => {
                vec!["Provide --client-id, --client-secret and --refresh-token"]
            }
            Self::Transport { status: Some(401 | 403), .. } => vec![
                "Check that the OAuth client has the chromewebstore scope",
                "Check that the account owns the extension",
            ],
            Self::Transport { .. } => vec![
                "Check network connectivity",
                "Check the store status page and try again later",
            ],
            Self::ReviewPending { .. } => vec![
                "Wait for the current review to finish",
                "Pass --allow-review-pending to treat this as success",
            ],
            Self::InvalidResponse { .. } => {
                vec!["The store API may have changed; rerun with --verbose"]
            }
            Self::PollExhausted { .. } | Self::PollTimedOut { .. } => vec![
                "Check the item status in the developer dashboard",
                "Raise --poll-timeout or --max-poll-attempts",
            ],
            Self::Cancelled { .. } => {
                vec!["Check the item status in the developer dashboard"]
            }
            Self::PackageRead { .. } => vec!["Check file permissions"],
            Self::PackageNotFound { .. } => vec![
                "Check the zip path",
                "Make sure the package is built before this step",
            ],
            Self::MultiplePackages { .. } => {
                vec!["Narrow the zip path pattern so it matches a single file"]
            }
            Self::Config(_) => vec!["Check .webstore-publisher.yaml and the command line flags"],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "AUTH_ERROR",
            Self::InvalidCredentials(_) => "INVALID_CREDENTIALS",
            Self::Transport { .. } => "TRANSPORT_ERROR",
            Self::ReviewPending { .. } => "REVIEW_PENDING",
            Self::InvalidResponse { .. } => "INVALID_RESPONSE",
            Self::PollExhausted { .. } => "POLL_EXHAUSTED",
            Self::PollTimedOut { .. } => "POLL_TIMED_OUT",
            Self::Cancelled { .. } => "CANCELLED",
            Self::PackageRead { .. } => "PACKAGE_READ_ERROR",
            Self::PackageNotFound { .. } => "PACKAGE_NOT_FOUND",
            Self::MultiplePackages { .. } => "MULTIPLE_PACKAGES",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error() {
        let error = StoreError::Auth {
            store: "chrome-web-store".to_string(),
            status: Some(400),
            body: r#"{"error":"invalid_grant"}"#.to_string(),
        };

        assert_eq!(error.store(), Some("chrome-web-store"));
        assert_eq!(error.status(), Some(400));
        assert_eq!(error.code(), "AUTH_ERROR");
        assert!(error.is_fatal());
        let message = error.to_string();
        assert!(message.contains("status 400"));
        assert!(message.contains("invalid_grant"));
    }

    #[test]
    fn test_auth_error_without_status() {
        let error = StoreError::Auth {
            store: "chrome-web-store".to_string(),
            status: None,
            body: "connection refused".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "[chrome-web-store] access token refresh rejected: connection refused"
        );
    }

    #[test]
    fn test_review_pending_is_classified_from_body() {
        let body = format!(
            r#"{{"error":{{"code":400,"message":"{}"}}}}"#,
            REVIEW_PENDING_MESSAGE
        );

        let error = StoreError::from_store_response(
            "chrome-web-store",
            "publish",
            Some(400),
            &body,
            &Redactor::default(),
        );

        assert!(matches!(error, StoreError::ReviewPending { .. }));
        assert!(!error.is_fatal());
        assert_eq!(error.code(), "REVIEW_PENDING");
    }

    #[test]
    fn test_review_pending_survives_secret_inside_message() {
        // A short credential that happens to occur in the upstream wording
        let redactor = Redactor::new(&["review"], false);
        let body = format!(r#"{{"error":{{"message":"{}"}}}}"#, REVIEW_PENDING_MESSAGE);

        let error = StoreError::from_store_response(
            "chrome-web-store",
            "publish",
            Some(400),
            &body,
            &redactor,
        );

        match error {
            StoreError::ReviewPending { message, .. } => {
                assert!(!message.contains("in review"));
            }
            other => panic!("expected review pending, got {:?}", other),
        }
    }

    #[test]
    fn test_other_wording_is_transport_error() {
        let body = "Publish condition not met: item is being reviewed";

        let error = StoreError::from_store_response(
            "chrome-web-store",
            "publish",
            Some(400),
            body,
            &Redactor::default(),
        );

        assert!(matches!(
            error,
            StoreError::Transport {
                status: Some(400),
                ..
            }
        ));
        assert!(error.is_fatal());
    }

    #[test]
    fn test_review_pending_predicate() {
        assert!(is_review_pending_message(REVIEW_PENDING_MESSAGE));
        assert!(!is_review_pending_message(
            "publish condition not met: you may not edit or publish an item that is in review."
        ));
        assert!(!is_review_pending_message(""));
    }

    #[test]
    fn test_transport_error_display() {
        let error = StoreError::Transport {
            store: "chrome-web-store".to_string(),
            operation: "upload".to_string(),
            status: Some(503),
            body: "Service Unavailable".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "[chrome-web-store] upload request failed with status 503: Service Unavailable"
        );
        assert_eq!(error.code(), "TRANSPORT_ERROR");
    }

    #[test]
    fn test_transport_forbidden_suggests_ownership() {
        let error = StoreError::Transport {
            store: "chrome-web-store".to_string(),
            operation: "publish".to_string(),
            status: Some(403),
            body: String::new(),
        };

        let actions = error.suggested_actions();
        assert!(actions.iter().any(|a| a.contains("owns the extension")));
    }

    #[test]
    fn test_multiple_packages_lists_matches() {
        let error = StoreError::MultiplePackages {
            pattern: "dist/*.zip".to_string(),
            matches: vec!["dist/a.zip".to_string(), "dist/b.zip".to_string()],
        };

        assert_eq!(error.store(), None);
        assert_eq!(
            error.to_string(),
            "multiple files found for dist/*.zip: dist/a.zip, dist/b.zip"
        );
    }

    #[test]
    fn test_every_error_has_suggested_actions() {
        let errors = vec![
            StoreError::Config("bad".to_string()),
            StoreError::PackageNotFound {
                pattern: "x.zip".to_string(),
            },
            StoreError::Cancelled {
                store: "s".to_string(),
            },
            StoreError::PollTimedOut {
                store: "s".to_string(),
                elapsed_secs: 1800,
            },
        ];

        for error in errors {
            assert!(!error.suggested_actions().is_empty(), "{}", error.code());
        }
    }
}
