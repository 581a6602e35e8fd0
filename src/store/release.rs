//! Publish requests and response classification
//!
//! https://developer.chrome.com/docs/webstore/using-api#publishpublic
//! https://developer.chrome.com/docs/webstore/using-api#trustedtesters

use crate::core::error::StoreError;
use crate::core::traits::{AccessToken, PublishOutcome, PublishResponse, PublishTarget};
use crate::store::http::StoreHttp;
use reqwest::Method;
use reqwest::header::CONTENT_LENGTH;
use tracing::{error, info};

/// Requests release of an uploaded package
pub struct ReleasePublisher<'a> {
    http: &'a StoreHttp,
}

impl<'a> ReleasePublisher<'a> {
    pub fn new(http: &'a StoreHttp) -> Self {
        Self { http }
    }

    /// A non-OK status set is returned as an unsuccessful outcome, not an error
    ///
    /// A review-pending rejection surfaces as [`StoreError::ReviewPending`].
    pub async fn publish(
        &self,
        extension_id: &str,
        target: PublishTarget,
        token: &AccessToken,
    ) -> Result<PublishOutcome, StoreError> {
        info!("Start to publish extension.");

        let backend = self.http.backend();
        let url = backend.publish_endpoint(extension_id)?;
        let builder = self
            .http
            .authorized(Method::POST, url, token, true)
            .query(&[(backend.publish_target_param.as_str(), target.as_param())])
            .header(CONTENT_LENGTH, 0)
            .body(Vec::new());

        let response: PublishResponse = self.http.store_call("publish", builder).await?;
        let outcome = PublishOutcome::from_response(target, response);

        if outcome.is_success() {
            info!("Extension published.");
        } else {
            for line in outcome.failure_message().lines() {
                error!("{}", line);
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::REVIEW_PENDING_MESSAGE;
    use crate::core::traits::PublishStatus;
    use crate::security::Redactor;
    use crate::store::backend::BackendConfig;
    use crate::store::http::HttpSettings;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const EXTENSION_ID: &str = "abcdefghijklmnopabcdefghijklmnop";

    fn test_http(server: &MockServer) -> StoreHttp {
        StoreHttp::new(
            BackendConfig::chrome_web_store_at(&server.uri(), &server.uri()),
            HttpSettings::default(),
            Redactor::default(),
        )
        .expect("http client")
    }

    fn publish_path() -> String {
        format!("/chromewebstore/v1.1/items/{}/publish", EXTENSION_ID)
    }

    fn publish_response(status: &[&str], details: &[&str]) -> serde_json::Value {
        serde_json::json!({
            "kind": "chromewebstore#item",
            "item_id": EXTENSION_ID,
            "status": status,
            "statusDetail": details
        })
    }

    #[tokio::test]
    async fn single_ok_is_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(publish_path()))
            .and(query_param("publishTarget", "default"))
            .and(header("Authorization", "Bearer test-token"))
            .and(header("x-goog-api-version", "2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(publish_response(&["OK"], &[])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let http = test_http(&server);
        let token = AccessToken::new("test-token", None);

        let outcome = ReleasePublisher::new(&http)
            .publish(EXTENSION_ID, PublishTarget::Default, &token)
            .await
            .expect("publish");

        assert!(outcome.is_success());
        assert_eq!(outcome.statuses, vec![PublishStatus::Ok]);
    }

    #[tokio::test]
    async fn trusted_testers_target_parameter() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(publish_path()))
            .and(query_param("publishTarget", "trustedTesters"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(publish_response(&["OK"], &[])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let http = test_http(&server);
        let token = AccessToken::new("test-token", None);

        let outcome = ReleasePublisher::new(&http)
            .publish(EXTENSION_ID, PublishTarget::from_tester_only(true), &token)
            .await
            .expect("publish");

        assert!(outcome.is_success());
        assert_eq!(outcome.target, PublishTarget::TrustedTesters);
    }

    #[tokio::test]
    async fn custom_target_parameter_name() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(publish_path()))
            .and(query_param("target", "default"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(publish_response(&["OK"], &[])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut backend = BackendConfig::chrome_web_store_at(&server.uri(), &server.uri());
        backend.publish_target_param = "target".to_string();
        let http = StoreHttp::new(backend, HttpSettings::default(), Redactor::default()).unwrap();
        let token = AccessToken::new("test-token", None);

        let outcome = ReleasePublisher::new(&http)
            .publish(EXTENSION_ID, PublishTarget::Default, &token)
            .await
            .expect("publish");

        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn ok_plus_pending_review_is_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(publish_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(publish_response(
                &["OK", "ITEM_PENDING_REVIEW"],
                &["Item is pending review."],
            )))
            .mount(&server)
            .await;

        let http = test_http(&server);
        let token = AccessToken::new("test-token", None);

        let outcome = ReleasePublisher::new(&http)
            .publish(EXTENSION_ID, PublishTarget::Default, &token)
            .await
            .expect("store rejection is not an error");

        assert!(!outcome.is_success());
        let message = outcome.failure_message();
        assert!(message.contains("OK, ITEM_PENDING_REVIEW"));
        assert!(message.ends_with("Item is pending review."));
    }

    #[tokio::test]
    async fn empty_status_is_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(publish_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(publish_response(&[], &[])))
            .mount(&server)
            .await;

        let http = test_http(&server);
        let token = AccessToken::new("test-token", None);

        let outcome = ReleasePublisher::new(&http)
            .publish(EXTENSION_ID, PublishTarget::Default, &token)
            .await
            .unwrap();

        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn in_review_rejection_is_review_pending() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(publish_path()))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {
                    "code": 400,
                    "message": REVIEW_PENDING_MESSAGE,
                    "status": "FAILED_PRECONDITION"
                }
            })))
            .mount(&server)
            .await;

        let http = test_http(&server);
        let token = AccessToken::new("test-token", None);

        let error = ReleasePublisher::new(&http)
            .publish(EXTENSION_ID, PublishTarget::Default, &token)
            .await
            .unwrap_err();

        assert!(matches!(error, StoreError::ReviewPending { .. }));
    }

    #[tokio::test]
    async fn other_rejection_is_transport_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(publish_path()))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {
                    "code": 400,
                    "message": "Publish condition not met: the item has no listing language."
                }
            })))
            .mount(&server)
            .await;

        let http = test_http(&server);
        let token = AccessToken::new("test-token", None);

        let error = ReleasePublisher::new(&http)
            .publish(EXTENSION_ID, PublishTarget::Default, &token)
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            StoreError::Transport {
                status: Some(400),
                ..
            }
        ));
    }
}
