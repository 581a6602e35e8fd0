//! Core traits and types for web store publishing
//!
//! This module defines the wire types of the store API, the outcomes the
//! pipeline hands back to its caller, and the [`WebStore`] abstraction the
//! pipeline is written against.

use crate::core::error::StoreError;
use crate::security::Credentials;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Access Token
// ============================================================================

/// OAuth2 token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Short-lived bearer token, valid for one invocation
#[derive(Debug, Clone)]
pub struct AccessToken {
    secret: SecretString,
    expires_in: Option<Duration>,
    issued_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_in: Option<Duration>) -> Self {
        Self {
            secret: SecretString::new(token.into().into()),
            expires_in,
            issued_at: Utc::now(),
        }
    }

    /// Raw bearer value; only the HTTP layer should call this
    pub fn secret(&self) -> &str {
        self.secret.expose_secret()
    }

    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}

impl From<TokenResponse> for AccessToken {
    fn from(response: TokenResponse) -> Self {
        Self::new(
            response.access_token,
            response.expires_in.map(Duration::from_secs),
        )
    }
}

// ============================================================================
// Upload
// ============================================================================

/// Processing state of an uploaded package
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadState {
    Success,
    InProgress,
    Failure,
    NotFound,
}

impl UploadState {
    pub fn is_pending(self) -> bool {
        self == Self::InProgress
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::InProgress => "IN_PROGRESS",
            Self::Failure => "FAILURE",
            Self::NotFound => "NOT_FOUND",
        }
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item-level error reported alongside a failed upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    #[serde(default)]
    pub error_code: String,
    #[serde(default)]
    pub error_detail: String,
}

/// Response of the upload and status endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    pub upload_state: UploadState,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub item_error: Vec<ItemError>,
}

/// Terminal result of an upload, after polling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub state: UploadState,
    pub item_id: String,
    /// Ordered (code, detail) pairs reported by the store
    pub errors: Vec<ItemError>,
    /// Number of status queries issued after the initial upload response
    pub status_checks: u32,
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        self.state == UploadState::Success
    }

    /// Human-readable detail lines, one per store-reported error
    pub fn failure_details(&self) -> Vec<String> {
        if self.is_success() {
            return Vec::new();
        }
        if self.errors.is_empty() {
            return vec![format!("Upload finished in state {}", self.state)];
        }
        self.errors
            .iter()
            .map(|error| {
                if error.error_code.is_empty() {
                    error.error_detail.clone()
                } else {
                    format!("{}: {}", error.error_code, error.error_detail)
                }
            })
            .collect()
    }
}

// ============================================================================
// Publish
// ============================================================================

/// Audience selector for a publish request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PublishTarget {
    #[default]
    Default,
    TrustedTesters,
}

impl PublishTarget {
    pub fn from_tester_only(tester_only: bool) -> Self {
        if tester_only {
            Self::TrustedTesters
        } else {
            Self::Default
        }
    }

    /// Value sent in the publish target query parameter
    pub fn as_param(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::TrustedTesters => "trustedTesters",
        }
    }
}

/// Status code in a publish response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PublishStatus {
    Ok,
    NotAuthorized,
    InvalidDeveloper,
    DeveloperNoOwnership,
    DeveloperSuspended,
    ItemNotFound,
    ItemPendingReview,
    ItemTakenDown,
    PublisherSuspended,
    /// Code outside the documented set, kept verbatim for reporting
    Unrecognized(String),
}

impl PublishStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ok => "OK",
            Self::NotAuthorized => "NOT_AUTHORIZED",
            Self::InvalidDeveloper => "INVALID_DEVELOPER",
            Self::DeveloperNoOwnership => "DEVELOPER_NO_OWNERSHIP",
            Self::DeveloperSuspended => "DEVELOPER_SUSPENDED",
            Self::ItemNotFound => "ITEM_NOT_FOUND",
            Self::ItemPendingReview => "ITEM_PENDING_REVIEW",
            Self::ItemTakenDown => "ITEM_TAKEN_DOWN",
            Self::PublisherSuspended => "PUBLISHER_SUSPENDED",
            Self::Unrecognized(code) => code,
        }
    }
}

impl From<String> for PublishStatus {
    fn from(code: String) -> Self {
        match code.as_str() {
            "OK" => Self::Ok,
            "NOT_AUTHORIZED" => Self::NotAuthorized,
            "INVALID_DEVELOPER" => Self::InvalidDeveloper,
            "DEVELOPER_NO_OWNERSHIP" => Self::DeveloperNoOwnership,
            "DEVELOPER_SUSPENDED" => Self::DeveloperSuspended,
            "ITEM_NOT_FOUND" => Self::ItemNotFound,
            "ITEM_PENDING_REVIEW" => Self::ItemPendingReview,
            "ITEM_TAKEN_DOWN" => Self::ItemTakenDown,
            "PUBLISHER_SUSPENDED" => Self::PublisherSuspended,
            _ => Self::Unrecognized(code),
        }
    }
}

impl From<PublishStatus> for String {
    fn from(status: PublishStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response of the publish endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishResponse {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub status: Vec<PublishStatus>,
    #[serde(rename = "statusDetail", default)]
    pub status_detail: Vec<String>,
}

/// Classified result of a publish request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub target: PublishTarget,
    pub statuses: Vec<PublishStatus>,
    pub details: Vec<String>,
}

impl PublishOutcome {
    pub fn from_response(target: PublishTarget, response: PublishResponse) -> Self {
        Self {
            target,
            statuses: response.status,
            details: response.status_detail,
        }
    }

    /// Exactly one status, and it is OK
    pub fn is_success(&self) -> bool {
        matches!(self.statuses.as_slice(), [PublishStatus::Ok])
    }

    pub fn joined_statuses(&self) -> String {
        self.statuses
            .iter()
            .map(PublishStatus::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Summary line followed by every detail line, in store order
    pub fn failure_message(&self) -> String {
        let mut lines = vec![format!(
            "Failed to publish extension: {}",
            self.joined_statuses()
        )];
        lines.extend(self.details.iter().cloned());
        lines.join("\n")
    }
}

// ============================================================================
// Store Trait
// ============================================================================

/// A web store that can take an extension package through token → upload → publish
///
/// The pipeline is written against this trait so the call sequence can be
/// checked without a network.
#[async_trait]
pub trait WebStore: Send + Sync {
    /// Store name used in logs and errors (e.g., "chrome-web-store")
    fn name(&self) -> &str;

    /// Exchange the long-lived refresh credential for a bearer token
    async fn exchange_token(&self, credentials: &Credentials) -> Result<AccessToken, StoreError>;

    /// Upload a package and wait until the store leaves `IN_PROGRESS`
    ///
    /// Store-reported failures come back as `Ok` with an unsuccessful outcome.
    async fn upload(
        &self,
        extension_id: &str,
        package: &Path,
        token: &AccessToken,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, StoreError>;

    /// Request release of the uploaded package to the given audience
    async fn publish(
        &self,
        extension_id: &str,
        target: PublishTarget,
        token: &AccessToken,
    ) -> Result<PublishOutcome, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(statuses: &[&str]) -> PublishOutcome {
        PublishOutcome {
            target: PublishTarget::Default,
            statuses: statuses
                .iter()
                .map(|s| PublishStatus::from(s.to_string()))
                .collect(),
            details: vec![],
        }
    }

    #[test]
    fn test_single_ok_is_success() {
        assert!(outcome(&["OK"]).is_success());
    }

    #[test]
    fn test_ok_with_pending_review_is_failure() {
        let result = outcome(&["OK", "ITEM_PENDING_REVIEW"]);

        assert!(!result.is_success());
        assert!(
            result
                .failure_message()
                .starts_with("Failed to publish extension: OK, ITEM_PENDING_REVIEW")
        );
    }

    #[test]
    fn test_empty_status_is_failure() {
        assert!(!outcome(&[]).is_success());
    }

    #[test]
    fn test_single_non_ok_is_failure() {
        assert!(!outcome(&["ITEM_TAKEN_DOWN"]).is_success());
    }

    #[test]
    fn test_failure_message_lists_details_in_order() {
        let result = PublishOutcome {
            target: PublishTarget::TrustedTesters,
            statuses: vec![PublishStatus::NotAuthorized],
            details: vec!["first".to_string(), "second".to_string()],
        };

        assert_eq!(
            result.failure_message(),
            "Failed to publish extension: NOT_AUTHORIZED\nfirst\nsecond"
        );
    }

    #[test]
    fn test_publish_target_mapping() {
        assert_eq!(
            PublishTarget::from_tester_only(true).as_param(),
            "trustedTesters"
        );
        assert_eq!(PublishTarget::from_tester_only(false).as_param(), "default");
    }

    #[test]
    fn test_publish_response_deserialization() {
        let json = r#"{
            "kind": "chromewebstore#item",
            "item_id": "abcdefghijklmnopabcdefghijklmnop",
            "status": ["OK", "SOMETHING_NEW"],
            "statusDetail": ["Published."]
        }"#;

        let response: PublishResponse = serde_json::from_str(json).unwrap();

        assert_eq!(response.status[0], PublishStatus::Ok);
        assert_eq!(
            response.status[1],
            PublishStatus::Unrecognized("SOMETHING_NEW".to_string())
        );
        assert_eq!(response.status_detail, vec!["Published.".to_string()]);
    }

    #[test]
    fn test_item_response_deserialization_with_errors() {
        let json = r#"{
            "kind": "chromewebstore#item",
            "id": "abcdefghijklmnopabcdefghijklmnop",
            "uploadState": "FAILURE",
            "itemError": [
                {"error_code": "ITEM_VERSION", "error_detail": "Version must be greater."},
                {"error_code": "MANIFEST", "error_detail": "Manifest is invalid."}
            ]
        }"#;

        let response: ItemResponse = serde_json::from_str(json).unwrap();

        assert_eq!(response.upload_state, UploadState::Failure);
        assert_eq!(response.item_error.len(), 2);
        assert!(response.public_key.is_none());
    }

    #[test]
    fn test_upload_failure_details_without_item_errors() {
        let result = UploadOutcome {
            state: UploadState::NotFound,
            item_id: String::new(),
            errors: vec![],
            status_checks: 0,
        };

        assert_eq!(
            result.failure_details(),
            vec!["Upload finished in state NOT_FOUND".to_string()]
        );
    }

    #[test]
    fn test_access_token_from_response() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"ya29.token","expires_in":3599,"scope":"s","token_type":"Bearer"}"#,
        )
        .unwrap();

        let token = AccessToken::from(response);

        assert_eq!(token.secret(), "ya29.token");
        assert_eq!(token.expires_in(), Some(Duration::from_secs(3599)));
        assert!(!format!("{:?}", token).contains("ya29.token"));
    }
}
