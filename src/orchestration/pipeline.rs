//! Publish pipeline - token exchange, upload, then publish
//!
//! Runs the three store operations in order against any [`WebStore`],
//! stopping at the first error or store rejection, and returns a
//! [`RunReport`] describing what happened.

use crate::core::error::StoreError;
use crate::core::traits::{AccessToken, PublishOutcome, PublishTarget, UploadOutcome, WebStore};
use crate::orchestration::package_locator::resolve_package;
use crate::security::Credentials;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// What to publish and how
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub extension_id: String,

    /// Package path or glob pattern; must resolve to exactly one file
    pub package: String,

    pub target: PublishTarget,

    /// Stop after a successful upload
    pub upload_only: bool,

    /// Treat an in-review publish rejection as success
    pub allow_review_pending: bool,
}

/// Result of one pipeline run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub store: String,
    pub extension_id: String,
    pub package: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub upload: Option<UploadOutcome>,
    pub publish: Option<PublishOutcome>,
    /// Raw store message of a tolerated review-pending rejection
    pub review_pending: Option<String>,
    pub success: bool,
    pub errors: Vec<String>,
}

impl RunReport {
    fn start(store: &str, extension_id: &str) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            store: store.to_string(),
            extension_id: extension_id.to_string(),
            package: None,
            started_at: now,
            finished_at: now,
            upload: None,
            publish: None,
            review_pending: None,
            success: false,
            errors: Vec::new(),
        }
    }

    fn finish(mut self, success: bool) -> Self {
        self.success = success;
        self.finished_at = Utc::now();
        self
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// One-paragraph human summary
    pub fn summary(&self) -> String {
        let package = self
            .package
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());

        let upload = match &self.upload {
            Some(outcome) => format!(
                "{} after {} status checks",
                outcome.state, outcome.status_checks
            ),
            None => "not run".to_string(),
        };

        let publish = match (&self.publish, &self.review_pending) {
            (_, Some(_)) => "skipped, item is in review".to_string(),
            (Some(outcome), None) => format!(
                "{} to {}",
                outcome.joined_statuses(),
                outcome.target.as_param()
            ),
            (None, None) => "not run".to_string(),
        };

        format!(
            "Run {} for {} on {}: {} in {}ms. Package: {}. Upload: {}. Publish: {}.",
            self.run_id,
            self.extension_id,
            self.store,
            if self.success { "succeeded" } else { "failed" },
            self.duration().num_milliseconds(),
            package,
            upload,
            publish
        )
    }
}

/// Drives one extension through a [`WebStore`]
pub struct Pipeline {
    store: Box<dyn WebStore>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(store: Box<dyn WebStore>) -> Self {
        Self::with_cancellation(store, CancellationToken::new())
    }

    pub fn with_cancellation(store: Box<dyn WebStore>, cancel: CancellationToken) -> Self {
        Self { store, cancel }
    }

    /// Token that stops the run at the next stage boundary or in-flight upload request
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Exchange credentials only, without touching the item
    pub async fn check_credentials(
        &self,
        credentials: &Credentials,
    ) -> Result<AccessToken, StoreError> {
        info!(store = self.store.name(), "Checking credentials.");
        let token = self.store.exchange_token(credentials).await?;
        info!(store = self.store.name(), "Credentials are valid.");
        Ok(token)
    }

    /// Run token exchange, upload and (unless upload-only) publish
    ///
    /// Store rejections come back as a report with `success == false`.
    /// A review-pending publish rejection is an error unless the request
    /// allows it.
    pub async fn run(
        &self,
        credentials: &Credentials,
        request: &PublishRequest,
    ) -> Result<RunReport, StoreError> {
        let mut report = RunReport::start(self.store.name(), &request.extension_id);
        info!(
            run_id = %report.run_id,
            store = self.store.name(),
            "Start to publish extension to Web Store."
        );

        let package = resolve_package(&request.package)?;
        info!("Package: {}", package.display());
        report.package = Some(package.clone());

        let token = self.store.exchange_token(credentials).await?;
        self.ensure_not_cancelled()?;

        let upload = self
            .store
            .upload(&request.extension_id, &package, &token, &self.cancel)
            .await?;
        let uploaded = upload.is_success();
        report.errors.extend(upload.failure_details());
        report.upload = Some(upload);

        if !uploaded {
            return Ok(report.finish(false));
        }

        if request.upload_only {
            info!("Upload-only mode: skipping publish.");
            return Ok(report.finish(true));
        }

        // An interrupt after a finished upload must not publish
        self.ensure_not_cancelled()?;

        match self
            .store
            .publish(&request.extension_id, request.target, &token)
            .await
        {
            Ok(outcome) => {
                let published = outcome.is_success();
                if !published {
                    report
                        .errors
                        .extend(outcome.failure_message().lines().map(String::from));
                }
                report.publish = Some(outcome);
                if published {
                    info!("Extension published successfully.");
                }
                Ok(report.finish(published))
            }
            Err(StoreError::ReviewPending { message, .. }) if request.allow_review_pending => {
                warn!("Item is in review; new version was uploaded but not published.");
                report.review_pending = Some(message);
                Ok(report.finish(true))
            }
            Err(e) => Err(e),
        }
    }

    fn ensure_not_cancelled(&self) -> Result<(), StoreError> {
        if self.cancel.is_cancelled() {
            warn!("Run cancelled.");
            return Err(StoreError::Cancelled {
                store: self.store.name().to_string(),
            });
        }
        Ok(())
    }
}
