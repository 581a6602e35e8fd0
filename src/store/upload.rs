//! Package upload and processing-state polling
//!
//! https://developer.chrome.com/docs/webstore/using-api#uploadexisitng
//! https://developer.chrome.com/docs/webstore/using-api#checkstatus

use crate::core::error::StoreError;
use crate::core::poll::{PollError, Poller};
use crate::core::traits::{AccessToken, ItemResponse, UploadOutcome};
use crate::store::http::StoreHttp;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Body, Method};
use std::path::Path;
use tokio::fs::File;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Uploads a package and waits for the store to finish processing it
pub struct PackageUploader<'a> {
    http: &'a StoreHttp,
    poller: &'a Poller,
}

impl<'a> PackageUploader<'a> {
    pub fn new(http: &'a StoreHttp, poller: &'a Poller) -> Self {
        Self { http, poller }
    }

    /// Store-reported failures are returned as an unsuccessful outcome, not an error
    pub async fn upload(
        &self,
        extension_id: &str,
        package: &Path,
        token: &AccessToken,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, StoreError> {
        info!("Start to update extension package.");

        let backend = self.http.backend();
        let upload_url = backend.upload_endpoint(extension_id)?;
        let status_url = backend.status_endpoint(extension_id)?;

        let file = File::open(package).await.map_err(|e| StoreError::PackageRead {
            path: package.to_path_buf(),
            message: e.to_string(),
        })?;
        let length = file
            .metadata()
            .await
            .map_err(|e| StoreError::PackageRead {
                path: package.to_path_buf(),
                message: e.to_string(),
            })?
            .len();

        // Streamed from disk; no request timeout so large packages can finish
        let builder = self
            .http
            .authorized(Method::PUT, upload_url, token, false)
            .header(CONTENT_LENGTH, length)
            .body(Body::from(file));
        let initial: ItemResponse = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(StoreError::Cancelled {
                    store: self.http.store_name().to_string(),
                });
            }
            result = self.http.store_call("upload", builder) => result?,
        };

        let polled = self
            .poller
            .poll_until(
                initial,
                |item: &ItemResponse| {
                    let pending = item.upload_state.is_pending();
                    if pending {
                        info!(
                            "Package is still uploading. Wait for {} seconds.",
                            self.poller.options().interval.as_secs()
                        );
                    }
                    pending
                },
                || {
                    let http = self.http;
                    let builder = http.authorized(Method::GET, status_url.clone(), token, true);
                    async move {
                        http.store_call::<ItemResponse>("status", builder)
                            .await
                            .map_err(UploadPollError::Store)
                    }
                },
                cancel,
            )
            .await
            .map_err(|e| self.poll_failure(e))?;

        let item = polled.value;
        let outcome = UploadOutcome {
            state: item.upload_state,
            item_id: item.id,
            errors: if backend.reports_item_errors {
                item.item_error
            } else {
                Vec::new()
            },
            status_checks: polled.checks,
        };

        if outcome.is_success() {
            info!("Extension package updated.");
        } else {
            error!("Failed to update extension package.");
            for detail in outcome.failure_details() {
                error!("{}", detail);
            }
        }

        Ok(outcome)
    }

    fn poll_failure(&self, error: UploadPollError) -> StoreError {
        let store = self.http.store_name().to_string();
        match error {
            UploadPollError::Store(e) => e,
            UploadPollError::Poll(PollError::Exhausted { attempts }) => {
                StoreError::PollExhausted { store, attempts }
            }
            UploadPollError::Poll(PollError::TimedOut { elapsed }) => StoreError::PollTimedOut {
                store,
                elapsed_secs: elapsed.as_secs(),
            },
            UploadPollError::Poll(PollError::Cancelled) => StoreError::Cancelled { store },
        }
    }
}

/// Status-check failure or poll bound, kept apart until the store name is known
#[derive(Debug)]
enum UploadPollError {
    Store(StoreError),
    Poll(PollError),
}

impl From<StoreError> for UploadPollError {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}

impl From<PollError> for UploadPollError {
    fn from(error: PollError) -> Self {
        Self::Poll(error)
    }
}
