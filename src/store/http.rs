//! Shared HTTP plumbing for store requests
//!
//! Every store call goes through [`StoreHttp`]: it attaches the bearer token
//! and the backend's static headers, logs status and (redacted) body at
//! debug level, and turns non-2xx responses into [`StoreError`]s.

use crate::core::error::StoreError;
use crate::core::traits::AccessToken;
use crate::security::Redactor;
use crate::store::backend::BackendConfig;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    /// Time allowed to establish a connection
    pub connect_timeout: Duration,
    /// Whole-request limit for token, status and publish calls; uploads have none
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Raw status and body of a completed exchange
#[derive(Debug)]
pub(crate) struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// reqwest client bound to one backend
#[derive(Debug, Clone)]
pub struct StoreHttp {
    client: Client,
    backend: BackendConfig,
    settings: HttpSettings,
    redactor: Redactor,
}

impl StoreHttp {
    pub fn new(
        backend: BackendConfig,
        settings: HttpSettings,
        redactor: Redactor,
    ) -> Result<Self, StoreError> {
        // Timeouts are per request; uploads carry none
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| StoreError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            backend,
            settings,
            redactor,
        })
    }

    pub fn backend(&self) -> &BackendConfig {
        &self.backend
    }

    pub fn store_name(&self) -> &str {
        &self.backend.name
    }

    pub(crate) fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    /// Unauthenticated request with the standard timeout
    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .timeout(self.settings.request_timeout)
    }

    /// Authenticated store request; `bounded` applies the request timeout
    pub(crate) fn authorized(
        &self,
        method: Method,
        url: Url,
        token: &AccessToken,
        bounded: bool,
    ) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", token.secret()));

        for (name, value) in &self.backend.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if bounded {
            builder = builder.timeout(self.settings.request_timeout);
        }

        builder
    }

    /// Send a request and read the whole response body
    pub(crate) async fn execute(
        &self,
        operation: &str,
        builder: RequestBuilder,
    ) -> Result<RawResponse, reqwest::Error> {
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        debug!(store = %self.backend.name, operation, status, "Response status code: {}", status);
        debug!(store = %self.backend.name, operation, "{}", self.redactor.redact(&body));

        Ok(RawResponse { status, body })
    }

    /// Send a store request and decode its JSON body
    ///
    /// Transport failures and non-2xx statuses become `Transport` errors, or
    /// `ReviewPending` when the body carries the in-review wording.
    pub(crate) async fn store_call<T: DeserializeOwned>(
        &self,
        operation: &str,
        builder: RequestBuilder,
    ) -> Result<T, StoreError> {
        let response = self.execute(operation, builder).await.map_err(|e| {
            StoreError::Transport {
                store: self.backend.name.clone(),
                operation: operation.to_string(),
                status: e.status().map(|s| s.as_u16()),
                body: self.redactor.redact(&e.to_string()),
            }
        })?;

        if !response.is_success() {
            let error = StoreError::from_store_response(
                &self.backend.name,
                operation,
                Some(response.status),
                &response.body,
                &self.redactor,
            );
            if let StoreError::ReviewPending { message, .. } = &error {
                warn!(
                    store = %self.backend.name,
                    operation,
                    raw = %message,
                    "Store reports the item is in review"
                );
            }
            return Err(error);
        }

        self.parse(operation, &response.body)
    }

    pub(crate) fn parse<T: DeserializeOwned>(
        &self,
        operation: &str,
        body: &str,
    ) -> Result<T, StoreError> {
        serde_json::from_str(body).map_err(|e| StoreError::InvalidResponse {
            store: self.backend.name.clone(),
            operation: operation.to_string(),
            message: format!("{} (body: {})", e, self.redactor.redact(body)),
        })
    }
}
