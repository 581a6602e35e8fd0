//! Web store API client
//!
//! [`WebStoreClient`] wires the three store operations ([`TokenExchanger`],
//! [`PackageUploader`], [`ReleasePublisher`]) onto one HTTP client and
//! exposes them through the [`WebStore`] trait.

pub mod backend;
pub mod http;
pub mod oauth;
pub mod release;
pub mod upload;

pub use backend::{BackendConfig, EXTENSION_ID_PLACEHOLDER};
pub use http::{HttpSettings, StoreHttp};
pub use oauth::TokenExchanger;
pub use release::ReleasePublisher;
pub use upload::PackageUploader;

use crate::core::error::StoreError;
use crate::core::poll::Poller;
use crate::core::traits::{AccessToken, PublishOutcome, PublishTarget, UploadOutcome, WebStore};
use crate::security::{Credentials, Redactor};
use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// HTTP-backed [`WebStore`]
pub struct WebStoreClient {
    http: StoreHttp,
    poller: Poller,
}

impl WebStoreClient {
    pub fn new(
        backend: BackendConfig,
        settings: HttpSettings,
        redactor: Redactor,
        poller: Poller,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            http: StoreHttp::new(backend, settings, redactor)?,
            poller,
        })
    }

    pub fn backend(&self) -> &BackendConfig {
        self.http.backend()
    }
}

#[async_trait]
impl WebStore for WebStoreClient {
    fn name(&self) -> &str {
        self.http.store_name()
    }

    async fn exchange_token(&self, credentials: &Credentials) -> Result<AccessToken, StoreError> {
        TokenExchanger::new(&self.http).exchange(credentials).await
    }

    async fn upload(
        &self,
        extension_id: &str,
        package: &Path,
        token: &AccessToken,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, StoreError> {
        PackageUploader::new(&self.http, &self.poller)
            .upload(extension_id, package, token, cancel)
            .await
    }

    async fn publish(
        &self,
        extension_id: &str,
        target: PublishTarget,
        token: &AccessToken,
    ) -> Result<PublishOutcome, StoreError> {
        ReleasePublisher::new(&self.http)
            .publish(extension_id, target, token)
            .await
    }
}
